//! Application services (use cases).
//!
//! These services drive the workload against each access path and turn the
//! resulting outcomes into downtime intervals and aggregates.
//!
//! - [`catalog`]: weighted operation selection and SQL plans
//! - [`executor`]: runs one plan on a session and classifies the result
//! - [`dispatcher`]: paced worker tasks per path
//! - [`monitor`]: locked health state machine per path and signal source
//! - [`aggregator`]: per-kind totals, latency and TPS
//! - [`recorder`]: the outcome sink and snapshot query surface
//! - [`probe`]: connect-and-ping liveness probe
//! - [`loadgen`]: external load-generator bridge
//! - [`run`]: one complete run and its report

pub mod aggregator;
pub mod catalog;
pub mod dispatcher;
pub mod executor;
pub mod loadgen;
pub mod monitor;
pub mod probe;
pub mod recorder;
pub mod run;
