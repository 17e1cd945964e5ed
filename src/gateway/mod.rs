//! Servers and the gateways used to reach them.
//!
//! A `Server` hands out `Tunnel`s: a reachable endpoint plus whatever has to be
//! torn down afterwards. `from_gateway` scopes a tunnel to one async callback.

mod mock;
mod relay;

pub use mock::StaticServer;
pub use relay::TcpRelay;

use crate::config::{GatewayMode, ServerConfig, ServerOptions};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// An address and port reachable from the local machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

enum Teardown {
    None,
    Relay(TcpRelay),
    Hook(Box<dyn FnOnce() + Send>),
}

/// An open tunnel to a port on a server.
///
/// Dropping the tunnel releases it. `close` does the same and also waits for a
/// relay to finish shutting down.
pub struct Tunnel {
    endpoint: Endpoint,
    teardown: Teardown,
}

impl Tunnel {
    /// A tunnel that needs no teardown.
    pub fn direct(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            teardown: Teardown::None,
        }
    }

    /// A tunnel backed by a running relay.
    pub fn relay(relay: TcpRelay) -> Self {
        Self {
            endpoint: relay.endpoint().clone(),
            teardown: Teardown::Relay(relay),
        }
    }

    /// A tunnel that runs `release` exactly once when closed or dropped.
    pub fn with_release(endpoint: Endpoint, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            endpoint,
            teardown: Teardown::Hook(Box::new(release)),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Releases the tunnel.
    pub async fn close(mut self) {
        match std::mem::replace(&mut self.teardown, Teardown::None) {
            Teardown::None => {}
            Teardown::Relay(relay) => relay.shutdown().await,
            Teardown::Hook(release) => release(),
        }
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.teardown, Teardown::None) {
            Teardown::None => {}
            Teardown::Relay(relay) => drop(relay),
            Teardown::Hook(release) => release(),
        }
    }
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// A logical server under test.
#[async_trait]
pub trait Server: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Per-service option overrides.
    fn options(&self) -> &ServerOptions;

    /// Opens a tunnel to `port` on this server.
    async fn open_tunnel(&self, port: u16) -> Result<Tunnel>;
}

/// Runs `f` with an endpoint tunnelled to `port` on `server`.
///
/// The endpoint is only valid while `f` runs. The tunnel is released after `f`
/// completes, whether it succeeded or failed, and also if the returned future
/// is dropped early. The result of `f` is returned unchanged.
pub async fn from_gateway<S, F, Fut, T>(server: &S, port: u16, f: F) -> Result<T>
where
    S: Server + ?Sized,
    F: FnOnce(Endpoint) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let tunnel = server.open_tunnel(port).await?;
    let endpoint = tunnel.endpoint().clone();
    debug!("Tunnel to {}:{} open at {}", server.name(), port, endpoint);

    let result = f(endpoint).await;

    tunnel.close().await;
    debug!("Tunnel to {}:{} closed", server.name(), port);
    result
}

/// A server described by a `ServerConfig`.
#[derive(Debug, Clone)]
pub struct ConfiguredServer {
    name: String,
    config: ServerConfig,
}

impl ConfiguredServer {
    pub fn new(name: impl Into<String>, config: ServerConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[async_trait]
impl Server for ConfiguredServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &ServerOptions {
        &self.config.options
    }

    async fn open_tunnel(&self, port: u16) -> Result<Tunnel> {
        let target = Endpoint::new(self.config.address.clone(), port);
        match self.config.gateway {
            GatewayMode::Direct => Ok(Tunnel::direct(target)),
            GatewayMode::Relay => Ok(Tunnel::relay(TcpRelay::start(target).await?)),
        }
    }
}
