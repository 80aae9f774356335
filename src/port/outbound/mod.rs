//! Outbound ports: what the engine needs from the outside world.

pub mod database;
pub mod sink;

pub use database::{Connector, Param, Session, Statement};
pub use sink::OutcomeSink;
