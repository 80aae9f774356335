//! Infrastructure configuration modules.

pub mod logging;
pub mod pool;
pub mod settings;
pub mod workload;

pub use logging::LoggingConfig;
pub use pool::{PathConfig, ReconnectionConfig};
pub use settings::Config;
pub use workload::{ProbeConfig, WorkloadConfig};
