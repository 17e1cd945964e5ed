//! Recording driver for testing.
//!
//! Stands in for a real MySQL server: every connect and query is recorded, and
//! queries answer with a canned result or a canned error.

use super::{ConnectParams, DatabaseClient, Driver, QueryResult};
use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A call observed by a `RecordingDriver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Connect(ConnectParams),
    Query(String),
    Close,
}

#[derive(Debug, Clone)]
enum Outcome {
    Rows(QueryResult),
    QueryError(String),
    ConnectError(String),
}

/// A driver that records calls and returns predefined results.
#[derive(Debug, Clone)]
pub struct RecordingDriver {
    calls: Arc<Mutex<Vec<DriverCall>>>,
    outcome: Outcome,
}

impl RecordingDriver {
    /// Creates a driver whose queries return an empty result.
    pub fn new() -> Self {
        Self::with_result(QueryResult::new())
    }

    /// Creates a driver whose queries return the given result.
    pub fn with_result(result: QueryResult) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            outcome: Outcome::Rows(result),
        }
    }

    /// Creates a driver whose queries fail with `ProbeError::Query(message)`.
    pub fn failing_query(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::QueryError(message.into()),
            ..Self::new()
        }
    }

    /// Creates a driver whose connects fail with `ProbeError::Connection(message)`.
    pub fn failing_connect(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::ConnectError(message.into()),
            ..Self::new()
        }
    }

    /// Returns every call recorded so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().clone()
    }

    /// Returns the parameters of every connect call.
    pub fn connects(&self) -> Vec<ConnectParams> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                DriverCall::Connect(params) => Some(params.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the text of every query call.
    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                DriverCall::Query(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DriverCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DriverCall>> {
        // A poisoned log only means another test thread panicked mid-push
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseClient>> {
        self.record(DriverCall::Connect(params.clone()));

        if let Outcome::ConnectError(message) = &self.outcome {
            return Err(ProbeError::connection(message.clone()));
        }

        Ok(Box::new(RecordingClient {
            driver: self.clone(),
        }))
    }
}

struct RecordingClient {
    driver: RecordingDriver,
}

#[async_trait]
impl DatabaseClient for RecordingClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.driver.record(DriverCall::Query(sql.to_string()));

        match &self.driver.outcome {
            Outcome::Rows(result) => Ok(result.clone()),
            Outcome::QueryError(message) => Err(ProbeError::query(message.clone())),
            Outcome::ConnectError(message) => Err(ProbeError::connection(message.clone())),
        }
    }

    async fn close(&self) -> Result<()> {
        self.driver.record(DriverCall::Close);
        Ok(())
    }
}
