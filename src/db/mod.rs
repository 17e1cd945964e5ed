//! Database abstraction layer for mysql-probe.
//!
//! Provides a trait-based interface for drivers and their connections, so the
//! query context can run against the real MySQL driver or a test double.

mod mock;
mod mysql;
mod types;

pub use mock::{DriverCall, RecordingDriver};
pub use mysql::{MySqlClient, MySqlDriver};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Parameters for opening a single driver connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ConnectParams {
    /// Returns a display-safe string (no password) for logs and errors.
    pub fn display_string(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Trait for drivers that can open database connections.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opens a new connection. Nothing is pooled or reused between calls.
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseClient>>;
}

/// Trait defining the interface for an open database connection.
///
/// All database operations are async and return Results with ProbeError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a SQL query and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
