//! Hourly day profiles used for demand, generation, prices and dispatch.

use std::ops::{Add, Index, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::StudyError;

/// Number of hourly periods in a study day.
pub const HOURS: usize = 24;

/// A day of hourly values, indexed 0–23.
///
/// The length is fixed by the type, so a profile can never have gaps.
/// Build one from untrusted data with [`HourlyProfile::from_slice`], which
/// rejects anything that is not exactly 24 values long.
///
/// # Examples
///
/// ```
/// use feeder_study::profile::HourlyProfile;
///
/// let demand = HourlyProfile::constant(100.0);
/// let pv = HourlyProfile::constant(30.0);
/// let net = demand - pv;
/// assert_eq!(net[7], 70.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyProfile([f64; HOURS]);

impl HourlyProfile {
    /// Wraps an array of hourly values.
    pub const fn new(values: [f64; HOURS]) -> Self {
        Self(values)
    }

    /// All-zero profile.
    pub const fn zeros() -> Self {
        Self([0.0; HOURS])
    }

    /// Profile with the same value in every hour.
    pub const fn constant(value: f64) -> Self {
        Self([value; HOURS])
    }

    /// Validates the length of `values` and copies them into a profile.
    ///
    /// `name` identifies the profile in the error (e.g. `"profiles.price"`).
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidProfile`] if `values.len() != 24`.
    pub fn from_slice(name: &str, values: &[f64]) -> Result<Self, StudyError> {
        let array: [f64; HOURS] = values.try_into().map_err(|_| StudyError::InvalidProfile {
            name: name.to_string(),
            len: values.len(),
        })?;
        Ok(Self(array))
    }

    /// Builds a profile by evaluating `f` for each hour.
    pub fn from_fn(f: impl FnMut(usize) -> f64) -> Self {
        Self(std::array::from_fn(f))
    }

    /// Hourly values as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Iterator over the hourly values.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    /// Multiplies every hour by `factor` (per-unit shape times capacity).
    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_fn(|h| self.0[h] * factor)
    }

    /// Largest hourly value.
    pub fn peak(&self) -> f64 {
        self.iter().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest hourly value.
    pub fn trough(&self) -> f64 {
        self.iter().fold(f64::INFINITY, f64::min)
    }

    /// Sum over the day.
    pub fn total(&self) -> f64 {
        self.iter().sum()
    }

    /// Returns `true` when every hour is a finite number.
    pub fn is_finite(&self) -> bool {
        self.iter().all(f64::is_finite)
    }
}

impl Default for HourlyProfile {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Index<usize> for HourlyProfile {
    type Output = f64;

    fn index(&self, hour: usize) -> &f64 {
        &self.0[hour]
    }
}

impl Add for HourlyProfile {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_fn(|h| self.0[h] + rhs.0[h])
    }
}

impl Sub for HourlyProfile {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_fn(|h| self.0[h] - rhs.0[h])
    }
}

impl Neg for HourlyProfile {
    type Output = Self;

    fn neg(self) -> Self {
        self.scaled(-1.0)
    }
}

impl Mul<f64> for HourlyProfile {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scaled(rhs)
    }
}

impl From<[f64; HOURS]> for HourlyProfile {
    fn from(values: [f64; HOURS]) -> Self {
        Self(values)
    }
}
