//! Outbound adapters: implementations of the database port.

pub mod postgres;
