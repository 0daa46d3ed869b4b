//! TCP server for the bridge daemon.
//!
//! The server:
//! - Listens on a loopback host/port for editor connections
//! - Serves exactly one connection at a time, inline in the accept loop
//! - Returns to accepting after a connection closes or fails
//! - Supports graceful shutdown via CancellationToken
//!
//! Serving inline rather than spawning per connection is the protocol
//! contract: requests on the single connection are processed strictly
//! sequentially, and a second client cannot connect mid-session.

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use aeb_engine::EngineHandle;

/// TCP server owning the listening socket and the engine handle.
pub struct BridgeServer {
    listener: TcpListener,
    engine: EngineHandle,
    cancel_token: CancellationToken,
    connection_counter: u64,
}

impl BridgeServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// A bind failure is unrecoverable for the daemon; callers abort
    /// startup on it.
    pub async fn bind(
        addr: &str,
        engine: EngineHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            listener,
            engine,
            cancel_token,
            connection_counter: 0,
        })
    }

    /// The address the listener is bound to.
    ///
    /// Useful when binding port 0, as the integration tests do.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the cancellation token is triggered.
    ///
    /// Each accepted connection is served to completion before the next
    /// accept; cancellation interrupts both an in-flight connection and
    /// the accept wait.
    pub async fn run(mut self) -> Result<(), ServerError> {
        match self.local_addr() {
            Ok(addr) => info!(addr = %addr, "Bridge server listening"),
            Err(_) => info!("Bridge server listening"),
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let connection_number = self.connection_counter;
                            self.connection_counter += 1;

                            info!(
                                connection = connection_number,
                                peer = %peer,
                                "Client connected"
                            );

                            let handler = ConnectionHandler::new(
                                stream,
                                self.engine.clone(),
                                connection_number,
                            );

                            tokio::select! {
                                _ = self.cancel_token.cancelled() => {
                                    info!("Server shutdown requested mid-connection");
                                    break;
                                }
                                _ = handler.run() => {}
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Keep listening; a failed accept poisons nothing.
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_the_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:65234".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:65234"));
        assert!(err.to_string().contains("in use"));
    }
}
