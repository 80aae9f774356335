use std::time::Duration;

use thiserror::Error;

use crate::domain::outcome::ErrorClass;
use crate::domain::path::PathName;

/// Configuration-related errors with structured variants.
///
/// Every variant is fatal: the run is aborted before any worker starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Connection pool errors.
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("no connection available on {path} within {waited:?}")]
    Exhausted { path: PathName, waited: Duration },

    #[error("pool for {path} is shut down")]
    Closed { path: PathName },
}

/// A classified database failure.
///
/// Produced by [`Session`](crate::port::outbound::database::Session)
/// implementations. The variant decides both the outcome's error class and
/// whether the connection may be reused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    Other(String),
}

impl SessionError {
    /// Error class recorded on the operation outcome.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ConnectionLost(_) => ErrorClass::ConnectionLost,
            Self::Timeout(_) => ErrorClass::Timeout,
            Self::ConstraintViolation(_) => ErrorClass::ConstraintViolation,
            Self::Other(_) => ErrorClass::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_maps_to_class() {
        assert_eq!(
            SessionError::ConnectionLost("eof".into()).class(),
            ErrorClass::ConnectionLost
        );
        assert_eq!(
            SessionError::Timeout("lock".into()).class(),
            ErrorClass::Timeout
        );
        assert_eq!(
            SessionError::ConstraintViolation("dup".into()).class(),
            ErrorClass::ConstraintViolation
        );
        assert_eq!(SessionError::Other("x".into()).class(), ErrorClass::Other);
    }

    #[test]
    fn pool_error_display_names_path() {
        let err = PoolError::Exhausted {
            path: PathName::from("proxied"),
            waited: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("proxied"));
    }
}
