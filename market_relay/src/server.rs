use crate::model::broadcast::Broadcaster;
use crate::model::store::MarketStore;
use crate::session::{SessionConfig, handle_client_stream};
use log::{debug, error, info, warn};
use market_common::RelayError;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

/// Websocket listener for downstream consumers.
///
/// Every accepted connection is subscribed to the broadcaster and served by its
/// own session thread. A failing connection only ends its own session; the
/// accept loop keeps running.
pub struct RelayServer {
    /// The underlying TCP listening socket.
    pub(crate) socket: TcpListener,
}

impl RelayServer {
    /// Bind a new server to `bind_addr` (e.g., `0.0.0.0:5001`).
    pub fn new(bind_addr: &str) -> Result<Self, RelayError> {
        let socket = TcpListener::bind(bind_addr)?;
        Ok(Self { socket })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking loop accepting consumers until the listener fails.
    pub fn accept_loop(
        self,
        store: Arc<MarketStore>,
        broadcaster: Arc<Broadcaster>,
        config: SessionConfig,
    ) -> Result<(), RelayError> {
        info!("Relay server is started on {}", self.socket.local_addr()?);

        for stream in self.socket.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("TCP connection error: {}", e);
                    continue;
                }
            };
            let peer = match stream.peer_addr() {
                Ok(peer) => peer,
                Err(e) => {
                    warn!("Dropping connection without peer address: {}", e);
                    continue;
                }
            };
            debug!("Accepted {}", peer);

            let events = broadcaster.subscribe();
            let store = Arc::clone(&store);
            let config = config.clone();
            let spawned = thread::Builder::new()
                .name(format!("session-{}", peer))
                .spawn(move || {
                    if let Err(e) = handle_client_stream(stream, peer, &store, events, &config) {
                        warn!("Session {} ended with error: {}", peer, e);
                    }
                });
            if let Err(e) = spawned {
                error!("Failed to spawn session for {}: {}", peer, e);
            }
        }
        Ok(())
    }
}
