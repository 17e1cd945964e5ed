//! Local TCP relay.
//!
//! Binds an ephemeral port on 127.0.0.1 and forwards every accepted connection
//! to a target endpoint until shut down.

use super::Endpoint;
use crate::error::{ProbeError, Result};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A running relay. Dropping it stops accepting and cuts open forwards.
#[derive(Debug)]
pub struct TcpRelay {
    endpoint: Endpoint,
    target: Endpoint,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TcpRelay {
    /// Starts a relay forwarding to `target`.
    pub async fn start(target: Endpoint) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| ProbeError::gateway(format!("Failed to bind relay listener: {e}")))?;
        let local = listener
            .local_addr()
            .map_err(|e| ProbeError::gateway(format!("Failed to read relay address: {e}")))?;

        let endpoint = Endpoint::new(local.ip().to_string(), local.port());
        let shutdown = CancellationToken::new();
        let listener = Arc::new(listener);
        let accept = move || {
            let listener = Arc::clone(&listener);
            async move { listener.accept().await }
        };
        let task = tokio::spawn(accept_loop(accept, target.clone(), shutdown.clone()));

        debug!("Relay {} -> {} started", endpoint, target);

        Ok(Self {
            endpoint,
            target,
            shutdown,
            task: Some(task),
        })
    }

    /// Local endpoint clients connect to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Endpoint connections are forwarded to.
    pub fn target(&self) -> &Endpoint {
        &self.target
    }

    /// Stops the relay and waits for the accept loop to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Relay {} task ended abnormally: {}", self.endpoint, e);
            }
        }
        debug!("Relay {} -> {} stopped", self.endpoint, self.target);
    }
}

impl Drop for TcpRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Accepts and forwards connections until `shutdown` is cancelled.
///
/// Accept errors (EMFILE, ECONNABORTED and the like) are transient for a
/// listener; the loop logs them and keeps going.
async fn accept_loop<A, F>(mut accept: A, target: Endpoint, shutdown: CancellationToken)
where
    A: FnMut() -> F,
    F: Future<Output = io::Result<(TcpStream, SocketAddr)>>,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = accept() => match accepted {
                Ok((inbound, peer)) => {
                    debug!("Relay connection from {} -> {}", peer, target);
                    let target = target.clone();
                    let cancel = shutdown.child_token();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            result = forward(inbound, &target) => {
                                if let Err(e) = result {
                                    warn!("Relay to {} failed: {}", target, e);
                                }
                            }
                        }
                    });
                }
                Err(e) => {
                    warn!("Relay {} accept failed: {}", target, e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
}

async fn forward(mut inbound: TcpStream, target: &Endpoint) -> io::Result<()> {
    let mut outbound = TcpStream::connect((target.address.as_str(), target.port)).await?;
    let (sent, received) = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await?;
    debug!("Relay to {} closed ({} bytes sent, {} bytes received)", target, sent, received);
    Ok(())
}
