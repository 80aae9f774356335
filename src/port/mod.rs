//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  dispatcher · monitor   │
//!                    │  aggregator · probe     │
//!                    └────────────┬────────────┘
//!                 ┌───────────────┴───────────────┐
//!                 ▼                               ▼
//!          ┌─────────────┐                 ┌─────────────┐
//!          │  Connector  │                 │ OutcomeSink │
//!          │  / Session  │                 │             │
//!          └─────────────┘                 └─────────────┘
//!          postgres, testkit               RunRecorder, test sinks
//! ```

pub mod outbound;

pub use outbound::{Connector, OutcomeSink, Param, Session, Statement};
