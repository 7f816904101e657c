//! TOML-based study configuration and preset definitions.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StudyError;
use crate::grid::FeederModel;
use crate::grid::feeder::FeederLine;
use crate::profile::{HOURS, HourlyProfile};
use crate::scenario::{DispatchPlan, ScenarioDefinition, StudyInputs};
use crate::study::dispatch::BatteryParameters;

const COMMUNITY_DEMAND_KW: [f64; HOURS] = [
    65.0, 65.0, 65.0, 74.0, 75.0, 80.0, 100.0, 148.0, 148.0, 148.0, 148.0, 148.0, 133.0, 123.0,
    123.0, 123.0, 123.0, 148.0, 148.0, 148.0, 246.0, 246.0, 148.0, 74.0,
];

const COMMUNITY_PV_PU: [f64; HOURS] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.05, 0.05, 0.2, 0.35, 0.6, 0.8, 0.95, 1.0, 0.9, 0.4, 0.2, 0.1,
    0.05, 0.0, 0.0, 0.0, 0.0, 0.0,
];

const COMMUNITY_EV_PU: [f64; HOURS] = [
    0.6, 0.7, 0.8, 0.7, 0.6, 0.5, 0.5, 0.4, 0.1, 0.1, 0.1, 0.1, 0.1, 0.2, 0.2, 0.2, 0.2, 0.6, 0.7,
    1.0, 1.0, 0.9, 0.7, 0.7,
];

const COMMUNITY_PRICE: [f64; HOURS] = [
    100.0, 100.0, 100.0, 50.0, 50.0, 50.0, 50.0, 100.0, 100.0, 100.0, 100.0, 50.0, 50.0, 50.0,
    50.0, 50.0, 50.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0,
];

/// `(id, from_bus, to_bus, max_i_ka)` of the medium-voltage benchmark feeder
/// with its tie switches open.
const COMMUNITY_LINES: [(usize, usize, usize, f64); 12] = [
    (0, 1, 2, 0.145),
    (1, 2, 3, 0.145),
    (2, 3, 4, 0.145),
    (3, 4, 5, 0.145),
    (4, 5, 6, 0.145),
    (5, 7, 8, 0.145),
    (6, 8, 9, 0.145),
    (7, 9, 10, 0.145),
    (8, 10, 11, 0.145),
    (9, 3, 8, 0.145),
    (10, 12, 13, 0.195),
    (11, 13, 14, 0.195),
];

/// Top-level study configuration parsed from TOML.
///
/// All fields have defaults matching the `community` preset. Load from
/// TOML with [`StudyConfig::from_toml_file`] or use
/// [`StudyConfig::community`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    /// Hourly demand, shape and price profiles.
    #[serde(default)]
    pub profiles: ProfilesConfig,
    /// Battery used by scenarios with a dispatch plan.
    #[serde(default)]
    pub battery: BatteryParameters,
    /// Feeder topology and ratings.
    #[serde(default)]
    pub feeder: FeederConfig,
    /// Study-wide settings.
    #[serde(default)]
    pub study: StudySettings,
    /// Scenarios to run, in order.
    #[serde(default = "community_scenarios")]
    pub scenarios: Vec<ScenarioDefinition>,
    /// Optional hosting-capacity search.
    #[serde(default)]
    pub hosting: Option<HostingConfig>,
}

/// Hourly profiles; each must hold exactly 24 values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilesConfig {
    /// Community demand per bus (kW).
    pub demand_kw: Vec<f64>,
    /// PV shape (per unit of installed capacity).
    pub pv_pu: Vec<f64>,
    /// EV charging shape (per unit of installed capacity).
    pub ev_pu: Vec<f64>,
    /// Energy price per hour.
    pub price: Vec<f64>,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            demand_kw: COMMUNITY_DEMAND_KW.to_vec(),
            pv_pu: COMMUNITY_PV_PU.to_vec(),
            ev_pu: COMMUNITY_EV_PU.to_vec(),
            price: COMMUNITY_PRICE.to_vec(),
        }
    }
}

/// Radial feeder description.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeederConfig {
    /// Feeder name used in logs.
    pub name: String,
    /// Nominal line-to-line voltage (kV).
    pub vn_kv: f64,
    /// Buses fed from upstream.
    pub source_buses: Vec<usize>,
    /// Buses where the community net demand is applied.
    pub community_buses: Vec<usize>,
    /// Lines of the feeder.
    pub lines: Vec<FeederLine>,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            name: "CIGRE MV (switches open)".to_string(),
            vn_kv: 20.0,
            source_buses: vec![1, 12],
            community_buses: vec![4, 5, 6, 9, 10, 11, 8, 7, 14, 13],
            lines: COMMUNITY_LINES
                .iter()
                .map(|&(id, from_bus, to_bus, max_i_ka)| FeederLine {
                    id,
                    from_bus,
                    to_bus,
                    max_i_ka,
                })
                .collect(),
        }
    }
}

/// Study-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudySettings {
    /// Critical loading above this value is a violation (percent).
    pub loading_limit_pct: f64,
    /// Directory for CSV artifacts.
    pub output_dir: PathBuf,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            loading_limit_pct: 100.0,
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Hosting-capacity search steps.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostingConfig {
    /// Capacity increment (kW).
    pub step_kw: f64,
    /// Largest capacity evaluated (kW).
    pub max_kw: f64,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            step_kw: 50.0,
            max_kw: 2_000.0,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.eta_c"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn community_scenarios() -> Vec<ScenarioDefinition> {
    let scenario = |name: &str, pv_kw: f64, ev_kw: f64, dispatch: Option<DispatchPlan>| {
        ScenarioDefinition {
            name: name.to_string(),
            pv_kw,
            ev_kw,
            dispatch,
        }
    };
    vec![
        scenario("base", 0.0, 0.0, None),
        scenario("pv", 800.0, 0.0, None),
        scenario(
            "pv_bess",
            950.0,
            0.0,
            Some(DispatchPlan {
                pv_kw: 800.0,
                ev_kw: 0.0,
            }),
        ),
        scenario("ev", 0.0, 360.0, None),
        scenario(
            "ev_bess",
            0.0,
            510.0,
            Some(DispatchPlan {
                pv_kw: 0.0,
                ev_kw: 360.0,
            }),
        ),
    ]
}

impl StudyConfig {
    /// Returns the community study: benchmark feeder, measured profiles and
    /// the base / PV / PV+BESS / EV / EV+BESS scenarios.
    pub fn community() -> Self {
        Self {
            profiles: ProfilesConfig::default(),
            battery: BatteryParameters::default(),
            feeder: FeederConfig::default(),
            study: StudySettings::default(),
            scenarios: community_scenarios(),
            hosting: None,
        }
    }

    /// Returns the flat preset: constant demand and price on the community
    /// feeder. Any battery cycling only adds degradation cost, so the
    /// dispatch stays idle.
    pub fn flat() -> Self {
        Self {
            profiles: ProfilesConfig {
                demand_kw: vec![100.0; HOURS],
                price: vec![50.0; HOURS],
                ..ProfilesConfig::default()
            },
            scenarios: vec![
                ScenarioDefinition::default(),
                ScenarioDefinition {
                    name: "pv".to_string(),
                    pv_kw: 300.0,
                    ..ScenarioDefinition::default()
                },
                ScenarioDefinition {
                    name: "bess".to_string(),
                    dispatch: Some(DispatchPlan::default()),
                    ..ScenarioDefinition::default()
                },
            ],
            hosting: Some(HostingConfig::default()),
            ..Self::community()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["community", "flat"];

    /// Loads a study from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "community" => Ok(Self::community()),
            "flat" => Ok(Self::flat()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a study from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a study from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let p = &self.profiles;
        for (field, values) in [
            ("profiles.demand_kw", &p.demand_kw),
            ("profiles.pv_pu", &p.pv_pu),
            ("profiles.ev_pu", &p.ev_pu),
            ("profiles.price", &p.price),
        ] {
            if values.len() != HOURS {
                errors.push(ConfigError::new(
                    field,
                    format!("must hold {HOURS} hourly values, got {}", values.len()),
                ));
            } else if values.iter().any(|v| !v.is_finite()) {
                errors.push(ConfigError::new(field, "values must be finite"));
            }
        }

        let b = &self.battery;
        if !(b.eta_c > 0.0 && b.eta_c <= 1.0) {
            errors.push(ConfigError::new("battery.eta_c", "must be in (0, 1]"));
        }
        if !(b.eta_d > 0.0 && b.eta_d <= 1.0) {
            errors.push(ConfigError::new("battery.eta_d", "must be in (0, 1]"));
        }
        if !(b.e_min_kwh <= b.e_ini_kwh && b.e_ini_kwh <= b.e_max_kwh) {
            errors.push(ConfigError::new(
                "battery.e_ini_kwh",
                "must satisfy e_min_kwh <= e_ini_kwh <= e_max_kwh",
            ));
        }
        if !(b.p_max_kw >= 0.0) {
            errors.push(ConfigError::new("battery.p_max_kw", "must be >= 0"));
        }
        if !(b.c_deg >= 0.0 && b.c_deg.is_finite()) {
            errors.push(ConfigError::new("battery.c_deg", "must be >= 0"));
        }

        self.validate_feeder(&mut errors);

        let s = &self.study;
        if !(s.loading_limit_pct > 0.0 && s.loading_limit_pct.is_finite()) {
            errors.push(ConfigError::new("study.loading_limit_pct", "must be > 0"));
        }

        let mut names = HashSet::new();
        for (i, sc) in self.scenarios.iter().enumerate() {
            if sc.name.is_empty() {
                errors.push(ConfigError::new(format!("scenarios[{i}].name"), "must not be empty"));
            } else if !names.insert(sc.name.as_str()) {
                errors.push(ConfigError::new(
                    format!("scenarios[{i}].name"),
                    format!("duplicate scenario \"{}\"", sc.name),
                ));
            }
            let plan = sc.dispatch.unwrap_or_default();
            for (field, value) in [
                ("pv_kw", sc.pv_kw),
                ("ev_kw", sc.ev_kw),
                ("dispatch.pv_kw", plan.pv_kw),
                ("dispatch.ev_kw", plan.ev_kw),
            ] {
                if !(value >= 0.0 && value.is_finite()) {
                    errors.push(ConfigError::new(
                        format!("scenarios[{i}].{field}"),
                        "must be >= 0",
                    ));
                }
            }
        }

        if let Some(h) = &self.hosting {
            if !(h.step_kw > 0.0 && h.step_kw.is_finite()) {
                errors.push(ConfigError::new("hosting.step_kw", "must be > 0"));
            }
            if !(h.max_kw >= 0.0 && h.max_kw.is_finite()) {
                errors.push(ConfigError::new("hosting.max_kw", "must be >= 0"));
            }
        }

        errors
    }

    fn validate_feeder(&self, errors: &mut Vec<ConfigError>) {
        let f = &self.feeder;
        if !(f.vn_kv > 0.0 && f.vn_kv.is_finite()) {
            errors.push(ConfigError::new("feeder.vn_kv", "must be > 0"));
        }
        if f.lines.is_empty() {
            errors.push(ConfigError::new("feeder.lines", "at least one line is required"));
        }
        if f.source_buses.is_empty() {
            errors.push(ConfigError::new(
                "feeder.source_buses",
                "at least one source bus is required",
            ));
        }

        let mut buses: HashSet<usize> = f.source_buses.iter().copied().collect();
        let mut ids = HashSet::new();
        for (i, line) in f.lines.iter().enumerate() {
            if !ids.insert(line.id) {
                errors.push(ConfigError::new(
                    format!("feeder.lines[{i}].id"),
                    format!("duplicate line id {}", line.id),
                ));
            }
            if line.from_bus == line.to_bus {
                errors.push(ConfigError::new(
                    format!("feeder.lines[{i}]"),
                    "from_bus and to_bus must differ",
                ));
            }
            if !(line.max_i_ka > 0.0 && line.max_i_ka.is_finite()) {
                errors.push(ConfigError::new(
                    format!("feeder.lines[{i}].max_i_ka"),
                    "must be > 0",
                ));
            }
            buses.insert(line.from_bus);
            buses.insert(line.to_bus);
        }
        for (i, bus) in f.community_buses.iter().enumerate() {
            if !buses.contains(bus) {
                errors.push(ConfigError::new(
                    format!("feeder.community_buses[{i}]"),
                    format!("bus {bus} is not connected to any line"),
                ));
            }
        }
        if let Err(failure) = self.feeder_model().check() {
            errors.push(ConfigError::new("feeder", failure.to_string()));
        }
    }

    /// Builds the power-flow adapter for the configured feeder.
    pub fn feeder_model(&self) -> FeederModel {
        let f = &self.feeder;
        FeederModel::new(
            f.name.clone(),
            f.vn_kv,
            f.lines.clone(),
            f.source_buses.clone(),
            f.community_buses.clone(),
        )
    }

    /// Converts the profile and battery tables into scenario inputs.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidProfile`] for a profile that does not
    /// hold 24 values.
    pub fn study_inputs(&self) -> Result<StudyInputs, StudyError> {
        let p = &self.profiles;
        Ok(StudyInputs {
            demand_kw: HourlyProfile::from_slice("profiles.demand_kw", &p.demand_kw)?,
            pv_pu: HourlyProfile::from_slice("profiles.pv_pu", &p.pv_pu)?,
            ev_pu: HourlyProfile::from_slice("profiles.ev_pu", &p.ev_pu)?,
            price: HourlyProfile::from_slice("profiles.price", &p.price)?,
            battery: self.battery,
            loading_limit_pct: self.study.loading_limit_pct,
        })
    }
}
