//! Community feeder impact study: hourly line-loading sweeps, battery
//! dispatch optimization and hosting-capacity search.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod error;
/// Power-flow seam and the radial feeder adapter.
pub mod grid;
pub mod io;
pub mod profile;
pub mod report;
pub mod scenario;
pub mod study;

pub use error::StudyError;
