//! Static server for testing.
//!
//! Always tunnels to a fixed endpoint and counts how often tunnels are opened
//! and released.

use super::{Endpoint, Server, Tunnel};
use crate::config::{MysqlOverrides, ServerOptions};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A server whose gateway always yields the same endpoint.
#[derive(Debug, Clone)]
pub struct StaticServer {
    endpoint: Endpoint,
    options: ServerOptions,
    requested: Arc<Mutex<Vec<u16>>>,
    released: Arc<AtomicUsize>,
}

impl StaticServer {
    /// Creates a server tunnelling every port to `address:port`.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Endpoint::new(address, port),
            options: ServerOptions::default(),
            requested: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the `mysql` option overrides.
    pub fn with_mysql(mut self, overrides: MysqlOverrides) -> Self {
        self.options.mysql = Some(overrides);
        self
    }

    /// Ports tunnels were requested for, in order.
    pub fn requested_ports(&self) -> Vec<u16> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of tunnels released so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Server for StaticServer {
    fn name(&self) -> &str {
        "static"
    }

    fn options(&self) -> &ServerOptions {
        &self.options
    }

    async fn open_tunnel(&self, port: u16) -> Result<Tunnel> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(port);

        let released = self.released.clone();
        Ok(Tunnel::with_release(self.endpoint.clone(), move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
