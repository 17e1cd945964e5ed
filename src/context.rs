//! MySQL query context.
//!
//! Resolves the MySQL options for a server, opens a tunnel to its MySQL port,
//! connects through it and runs one query. Errors from the gateway or driver
//! are returned exactly as they were raised.

use crate::config::MysqlOptions;
use crate::db::{ConnectParams, Driver, QueryResult};
use crate::error::Result;
use crate::gateway::{from_gateway, Server};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A query step: the literal SQL text to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlQuery {
    query: String,
}

impl MysqlQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl fmt::Display for MysqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mysql '{}'", self.query)
    }
}

/// Runs a `MysqlQuery` against a server through its gateway.
pub struct MysqlQueryContext {
    server: Arc<dyn Server>,
    query: MysqlQuery,
    driver: Arc<dyn Driver>,
}

impl MysqlQueryContext {
    pub fn new(server: Arc<dyn Server>, query: MysqlQuery, driver: Arc<dyn Driver>) -> Self {
        Self {
            server,
            query,
            driver,
        }
    }

    pub fn query(&self) -> &MysqlQuery {
        &self.query
    }

    /// Effective options: defaults with the server's `mysql` overrides on top.
    pub fn options(&self) -> MysqlOptions {
        MysqlOptions::resolve(self.server.options().mysql.as_ref())
    }

    /// Connects through the server's gateway and runs the query.
    ///
    /// Every call opens its own tunnel and connection.
    pub async fn results(&self) -> Result<QueryResult> {
        let options = self.options();
        debug!(
            "Running {} on {} as {}",
            self.query,
            self.server.name(),
            options.display_string()
        );

        from_gateway(self.server.as_ref(), options.port, |endpoint| async move {
            let params = ConnectParams {
                host: endpoint.address,
                port: endpoint.port,
                username: options.user,
                password: options.password,
            };
            let client = self.driver.connect(&params).await?;
            client.execute_query(self.query.query()).await
        })
        .await
    }
}

impl fmt::Debug for MysqlQueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlQueryContext")
            .field("server", &self.server.name())
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
