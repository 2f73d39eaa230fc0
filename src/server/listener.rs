//! TCP Listener
//!
//! Owns the listening socket and the state shared by every connection:
//! the store, the command table, the authenticated set, and the registry of
//! live sessions. Each accepted socket gets a [`Registration`] and its own
//! task; the accept loop never waits on a session.

use crate::commands::{CommandHandler, CommandRegistry};
use crate::config::{ConfigError, ServerConfig};
use crate::connection::{
    handle_connection, AuthTracker, ConnectionRegistry, ConnectionStats, Registration,
};
use crate::protocol::LineParser;
use crate::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// State reachable from both the accept loop and any [`ServerHandle`].
#[derive(Debug)]
struct Shared {
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
    connections: Arc<ConnectionRegistry>,
    stats: Arc<ConnectionStats>,
}

/// A bound, not yet running, server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    storage: Arc<StorageEngine>,
    auth: Arc<AuthTracker>,
    commands: CommandHandler,
    parser: LineParser,
    shared: Arc<Shared>,
}

impl Server {
    /// Validates `config` and binds the listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let storage = Arc::new(StorageEngine::new());
        let auth = Arc::new(AuthTracker::new(config.password.clone()));
        let registry = Arc::new(CommandRegistry::new());
        let parser = LineParser::new(config.max_line_length);
        let (stop_tx, _) = watch::channel(false);

        info!(
            addr = %local_addr,
            auth = auth.password_required(),
            max_line_length = parser.max_line_length(),
            commands = ?registry.names(),
            "Listening"
        );

        let commands = CommandHandler::new(Arc::clone(&storage), registry, Arc::clone(&auth));

        Ok(Self {
            listener,
            local_addr,
            parser,
            config,
            storage,
            auth,
            commands,
            shared: Arc::new(Shared {
                running: AtomicBool::new(true),
                stop_tx,
                connections: Arc::new(ConnectionRegistry::new()),
                stats: Arc::new(ConnectionStats::new()),
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A cloneable handle for stopping the server from another task.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Accepts connections until [`ServerHandle::stop`] is called.
    ///
    /// The listening socket is closed when this returns.
    pub async fn run(self) {
        let sweeper = self.config.active_expiry.then(|| {
            ExpirySweeper::start(
                Arc::clone(&self.storage),
                ExpiryConfig {
                    interval: self.config.expiry_interval,
                },
            )
        });

        let mut stop_rx = self.shared.stop_tx.subscribe();

        loop {
            tokio::select! {
                biased;

                _ = wait_stopped(&mut stop_rx) => break,
                result = self.listener.accept() => match result {
                    Ok((socket, peer)) => self.spawn_session(socket, peer),
                    Err(e) => {
                        if !self.shared.running.load(Ordering::SeqCst) {
                            break;
                        }
                        error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        if let Some(sweeper) = sweeper {
            sweeper.stop();
        }
        info!(addr = %self.local_addr, "Server stopped accepting connections");
    }

    fn spawn_session(&self, socket: TcpStream, peer: SocketAddr) {
        if let Err(e) = socket.set_nodelay(true) {
            warn!(client = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let registration = Registration::new(
            Arc::clone(&self.shared.connections),
            Arc::clone(&self.auth),
            peer,
        );

        // A stop that raced with this accept has already run close_all
        if !self.shared.running.load(Ordering::SeqCst) {
            debug!(client = %peer, "Dropping connection accepted during shutdown");
            return;
        }

        tokio::spawn(handle_connection(
            socket,
            registration,
            self.commands.clone(),
            self.parser.clone(),
            Arc::clone(&self.shared.stats),
        ));
    }
}

async fn wait_stopped(stop_rx: &mut watch::Receiver<bool>) {
    // The sender lives in `Shared`, so this only resolves on stop
    let _ = stop_rx.wait_for(|stopped| *stopped).await;
}

/// Controls a running [`Server`].
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl ServerHandle {
    /// Stops accepting new connections and closes every live session.
    ///
    /// Safe to call more than once and from any task.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping server");
        self.shared.stop_tx.send_replace(true);
        let closed = self.shared.connections.close_all();
        info!(closed, "Closed live connections");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Number of sessions that are still registered.
    pub fn active_connections(&self) -> usize {
        self.shared.connections.len()
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.shared.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let config = ServerConfig {
            max_line_length: 0,
            ..test_config()
        };
        let err = Server::bind(config).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(ConfigError::ZeroLineLength)));
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let server = Server::bind(test_config()).await.unwrap();
        let handle = server.handle();
        assert!(handle.is_running());

        handle.stop();
        handle.stop();
        assert!(!handle.is_running());

        tokio::time::timeout(Duration::from_secs(2), server.run())
            .await
            .expect("run should return once stopped");
    }

    #[tokio::test]
    async fn test_serves_and_stops() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"PING\r\n").await.unwrap();
        let mut buf = [0u8; 7];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"+PONG\r\n");
        assert_eq!(handle.active_connections(), 1);

        handle.stop();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("accept loop did not stop")
            .unwrap();

        let n = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
