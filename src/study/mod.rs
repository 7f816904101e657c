//! Study core: hourly loading sweep, battery dispatch and hosting search.

pub mod dispatch;
pub mod hosting;
pub mod loading;

pub use dispatch::{BatteryParameters, DispatchRecord, DispatchResult, optimize_dispatch};
pub use hosting::{Direction, HostingResult, HostingStep, search_hosting_capacity};
#[cfg(feature = "parallel")]
pub use loading::compute_hourly_loading_parallel;
pub use loading::{CriticalPoint, LineInfo, LoadingMatrix, LoadingSweep, compute_hourly_loading};
