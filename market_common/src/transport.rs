//! Socket.IO-over-websocket connector for the upstream feed.
//!
//! One connection attempt walks through five steps, all sharing one deadline
//! set `FeedConfig::connect_timeout` after the attempt starts:
//!
//! 1. DNS lookup of the upstream host, on a helper thread so it can be abandoned.
//! 2. TCP connect to the first reachable address, with whatever time is left.
//! 3. TLS (for `https`/`wss`) and the websocket upgrade, carrying the `Origin` header.
//! 4. Engine.IO open: the server sends its session id and heartbeat timings.
//! 5. Socket.IO connect on the default namespace.
//!
//! After that the socket read timeout drops to `POLL_INTERVAL`, so
//! `SocketIoSession::poll_event` returns `Polled::Idle` regularly and the feed loop
//! can notice shutdown. Server pings are answered inside the session; a server
//! that stays silent past `pingInterval + pingTimeout` ends the session.

use crossbeam_channel::bounded;
use log::{debug, info};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::error::RelayError;
use crate::feed::{Connector, FeedConfig, FeedEvent, FeedSession, Polled};
use crate::heartbeat::Heartbeat;
use crate::net::POLL_INTERVAL;
use crate::protocol::{ENGINE_IO_VERSION, Handshake, Packet};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Build the Engine.IO websocket endpoint for a Socket.IO base URL.
///
/// `https://host` becomes `wss://host/socket.io/?EIO=4&transport=websocket`; an explicit
/// path other than `/` is kept.
pub fn engine_io_url(base: &str) -> Result<Url, RelayError> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RelayError::Format(format!(
                "unsupported upstream scheme {}",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RelayError::Format(format!("cannot use scheme {} for {}", scheme, base)))?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.query_pairs_mut()
        .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
        .append_pair("transport", "websocket");
    Ok(url)
}

/// Opens Socket.IO sessions against the configured upstream.
pub struct SocketIoConnector {
    config: FeedConfig,
}

impl SocketIoConnector {
    /// Create a connector for `config`.
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    fn open_tcp(&self, url: &Url, deadline: Instant) -> Result<TcpStream, RelayError> {
        let addrs = resolve(url, deadline)?;
        let mut last_err = None;
        for addr in addrs {
            let remaining = time_left(deadline)?;
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.map(RelayError::Io).unwrap_or_else(|| {
            RelayError::Format(format!("no address found for {}", url))
        }))
    }
}

impl Connector for SocketIoConnector {
    type Session = SocketIoSession;

    fn connect(&mut self) -> Result<SocketIoSession, RelayError> {
        let deadline = Instant::now() + self.config.connect_timeout;
        let url = engine_io_url(&self.config.url)?;

        let stream = self.open_tcp(&url, deadline)?;
        let control = stream.try_clone()?;
        let remaining = time_left(deadline)?;
        control.set_read_timeout(Some(remaining))?;
        control.set_write_timeout(Some(remaining))?;
        control.set_nodelay(true)?;

        let mut request = url.as_str().into_client_request()?;
        let origin = HeaderValue::from_str(&self.config.origin)
            .map_err(|e| RelayError::Format(format!("invalid origin header: {}", e)))?;
        request.headers_mut().insert("Origin", origin);

        let (mut socket, _response) =
            tungstenite::client_tls_with_config(request, stream, None, None)
                .map_err(|e| RelayError::Handshake(e.to_string()))?;
        control.set_read_timeout(Some(POLL_INTERVAL))?;

        let handshake = match read_packet(&mut socket, deadline)? {
            Packet::Open(handshake) => handshake,
            other => {
                return Err(RelayError::Handshake(format!(
                    "expected engine.io open, got {:?}",
                    other
                )));
            }
        };
        debug!("Engine.IO session {} open", handshake.sid);

        socket.send(Message::Text(Packet::Connect(None).encode()?))?;
        loop {
            match read_packet(&mut socket, deadline)? {
                Packet::Connect(_) => break,
                Packet::ConnectError(reason) => {
                    return Err(RelayError::Handshake(format!(
                        "socket.io connect refused: {}",
                        reason
                    )));
                }
                Packet::Ping => socket.send(Message::Text(Packet::Pong.encode()?))?,
                other => debug!("Ignoring {:?} during handshake", other),
            }
        }

        info!("Connected to {}", url);
        Ok(SocketIoSession::new(socket, &handshake))
    }
}

/// Time until `deadline`, or a handshake timeout once it has passed.
fn time_left(deadline: Instant) -> Result<Duration, RelayError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        Err(RelayError::Handshake("timed out".to_string()))
    } else {
        Ok(remaining)
    }
}

/// Resolve the upstream host, giving up at `deadline`.
///
/// The lookup itself cannot be cancelled; an abandoned one finishes on its
/// helper thread and its result is discarded.
fn resolve(url: &Url, deadline: Instant) -> Result<Vec<SocketAddr>, RelayError> {
    let (tx, rx) = bounded(1);
    let target = url.clone();
    thread::Builder::new()
        .name("upstream-dns".to_string())
        .spawn(move || {
            let _ = tx.send(target.socket_addrs(|| None));
        })?;
    match rx.recv_timeout(time_left(deadline)?) {
        Ok(addrs) => Ok(addrs?),
        Err(_) => Err(RelayError::Handshake(format!(
            "DNS lookup for {} timed out",
            url.host_str().unwrap_or_default()
        ))),
    }
}

/// Read the next decodable packet, failing once `deadline` passes.
fn read_packet(socket: &mut Socket, deadline: Instant) -> Result<Packet, RelayError> {
    loop {
        if Instant::now() >= deadline {
            return Err(RelayError::Handshake("timed out".to_string()));
        }
        match socket.read() {
            Ok(Message::Text(text)) => match Packet::decode(&text) {
                Ok(packet) => return Ok(packet),
                Err(e) => debug!("Undecodable frame during handshake: {}", e),
            },
            Ok(Message::Close(_)) => {
                return Err(RelayError::Handshake("closed during handshake".to_string()));
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e)) if is_timeout(&e) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// A connected upstream session.
pub struct SocketIoSession {
    socket: Socket,
    heartbeat: Heartbeat,
}

impl SocketIoSession {
    fn new(socket: Socket, handshake: &Handshake) -> Self {
        Self {
            socket,
            heartbeat: Heartbeat::from_millis(
                handshake.ping_interval,
                handshake.ping_timeout,
                Instant::now(),
            ),
        }
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<(), RelayError> {
        self.socket.send(Message::Text(packet.encode()?))?;
        Ok(())
    }

    fn on_text(&mut self, text: &str) -> Result<Polled, RelayError> {
        match Packet::decode(text) {
            Ok(Packet::Ping) => {
                self.send_packet(&Packet::Pong)?;
                Ok(Polled::Idle)
            }
            Ok(Packet::Event { name, args }) => Ok(Polled::Event(FeedEvent { name, args })),
            Ok(Packet::Close) | Ok(Packet::Disconnect) => Ok(Polled::Closed),
            Ok(other) => {
                debug!("Ignoring upstream packet {:?}", other);
                Ok(Polled::Idle)
            }
            Err(e) => {
                debug!("Undecodable upstream frame: {}", e);
                Ok(Polled::Idle)
            }
        }
    }
}

impl FeedSession for SocketIoSession {
    fn emit(&mut self, event: &str) -> Result<(), RelayError> {
        self.send_packet(&Packet::event(event, Vec::new()))
    }

    fn poll_event(&mut self) -> Result<Polled, RelayError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => {
                self.heartbeat.record_activity(Instant::now());
                self.on_text(&text)
            }
            Ok(Message::Close(_)) => Ok(Polled::Closed),
            Ok(_) => {
                self.heartbeat.record_activity(Instant::now());
                Ok(Polled::Idle)
            }
            Err(tungstenite::Error::Io(e)) if is_timeout(&e) => {
                if self.heartbeat.is_silent(Instant::now()) {
                    Err(RelayError::Protocol("upstream heartbeat timed out".to_string()))
                } else {
                    Ok(Polled::Idle)
                }
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(Polled::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        let _ = self.send_packet(&Packet::Disconnect);
        let _ = self.socket.close(None);
        // Drain until the close handshake completes or the peer stops answering.
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            match self.socket.read() {
                Ok(_) => {}
                Err(tungstenite::Error::Io(e)) if is_timeout(&e) => {}
                Err(_) => break,
            }
        }
    }
}
