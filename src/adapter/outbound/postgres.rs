//! PostgreSQL adapter over `tokio-postgres`.
//!
//! One [`PostgresConnector`] per access path. Each session sets
//! `statement_timeout` and `lock_timeout` right after connecting, so a
//! transaction stuck behind a row lock fails server-side at the same bound
//! the executor enforces client-side.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::debug;

use crate::domain::{AccessPath, PathName};
use crate::error::SessionError;
use crate::port::outbound::database::{Connector, Param, Session, Statement};

/// Opens sessions against one access path's endpoint.
pub struct PostgresConnector {
    path: PathName,
    config: tokio_postgres::Config,
    target: String,
    connect_timeout: Duration,
    statement_timeout: Duration,
}

impl PostgresConnector {
    #[must_use]
    pub fn new(path: &AccessPath, statement_timeout: Duration) -> Self {
        let endpoint = &path.endpoint;
        let mut config = tokio_postgres::Config::new();
        config
            .host(&endpoint.host)
            .port(endpoint.port)
            .dbname(&endpoint.database)
            .user(&endpoint.user)
            .application_name("failwatch")
            .connect_timeout(path.connect_timeout);
        if !endpoint.password.is_empty() {
            config.password(&endpoint.password);
        }

        Self {
            path: path.name.clone(),
            config,
            target: endpoint.to_string(),
            connect_timeout: path.connect_timeout,
            statement_timeout,
        }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self) -> Result<Box<dyn Session>, SessionError> {
        let connecting = self.config.connect(NoTls);
        let (client, connection) = tokio::time::timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| SessionError::ConnectionLost("connect timed out".into()))?
            .map_err(|e| classify(&e))?;

        let path = self.path.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(path = %path, error = %e, "Connection task ended");
            }
        });

        let ms = self.statement_timeout.as_millis();
        client
            .batch_execute(&format!(
                "SET statement_timeout = {ms}; SET lock_timeout = {ms}"
            ))
            .await
            .map_err(|e| classify(&e))?;

        Ok(Box::new(PostgresSession { client }))
    }

    fn target(&self) -> String {
        self.target.clone()
    }
}

pub struct PostgresSession {
    client: Client,
}

fn bind(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|param| match param {
            Param::Int(v) => v as &(dyn ToSql + Sync),
            Param::Text(v) => v as &(dyn ToSql + Sync),
        })
        .collect()
}

#[async_trait]
impl Session for PostgresSession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError> {
        self.client
            .execute(statement.sql, &bind(&statement.params))
            .await
            .map_err(|e| classify(&e))
    }

    async fn transaction(&mut self, statements: &[Statement]) -> Result<u64, SessionError> {
        // Dropping an uncommitted transaction rolls it back.
        let tx = self.client.transaction().await.map_err(|e| classify(&e))?;
        let mut rows = 0;
        for statement in statements {
            rows += tx
                .execute(statement.sql, &bind(&statement.params))
                .await
                .map_err(|e| classify(&e))?;
        }
        tx.commit().await.map_err(|e| classify(&e))?;
        Ok(rows)
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| classify(&e))
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// Map a driver error onto the session error classes.
fn classify(error: &tokio_postgres::Error) -> SessionError {
    let message = error.to_string();
    if let Some(state) = error.code() {
        return classify_sqlstate(state.code(), message);
    }
    let io = error
        .source()
        .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());
    if error.is_closed() || io {
        SessionError::ConnectionLost(message)
    } else {
        SessionError::Other(message)
    }
}

/// Classify by SQLSTATE.
///
/// `25006` (read-only transaction) shows up when a session still points at
/// a demoted primary after failover, so it counts as a lost connection.
fn classify_sqlstate(code: &str, message: String) -> SessionError {
    match code {
        "57014" | "55P03" => SessionError::Timeout(message),
        "25006" => SessionError::ConnectionLost(message),
        c if c.starts_with("23") => SessionError::ConstraintViolation(message),
        c if c.starts_with("08") || c.starts_with("57P0") => SessionError::ConnectionLost(message),
        _ => SessionError::Other(message),
    }
}
