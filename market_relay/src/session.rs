//! Per-consumer downstream session.
//!
//! Each accepted connection runs `handle_client_stream` on its own thread:
//!
//! 1. Websocket upgrade.
//! 2. Engine.IO open (`0{..}`) with a fresh session id and the heartbeat timings.
//! 3. Wait for the consumer's Socket.IO connect (`40`) and acknowledge it.
//! 4. Send the current snapshot, if the store already knows a symbol.
//! 5. Forward every broadcast as `42["market_data",{..}]`, ping every interval, and
//!    stop when the consumer disconnects, misses a pong, or the broadcaster is gone.
//!
//! The socket read timeout is kept short so one thread can interleave reading the
//! consumer, draining its broadcast queue and running the heartbeat.

use crossbeam_channel::TryRecvError;
use log::{debug, info};
use market_common::heartbeat::{Heartbeat, HeartbeatAction};
use market_common::net::{PING_INTERVAL, PING_TIMEOUT};
use market_common::protocol::{Handshake, MARKET_DATA, Packet};
use market_common::{RelayError, Result};
use rand::distr::{Alphanumeric, SampleString};
use serde_json::json;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use tungstenite::{Message, WebSocket};

use crate::model::broadcast::{MarketData, Subscription};
use crate::model::store::MarketStore;

/// Read timeout while a session is live; bounds broadcast latency.
const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Largest payload advertised in the open packet.
const MAX_PAYLOAD: u64 = 1_000_000;
/// Session id length, matching what Engine.IO servers hand out.
const SID_LEN: usize = 20;

/// Downstream session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay between server pings.
    pub ping_interval: Duration,
    /// Time a consumer has to answer a ping.
    pub ping_timeout: Duration,
    /// Bound on the websocket upgrade plus the Socket.IO connect.
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: PING_INTERVAL,
            ping_timeout: PING_TIMEOUT,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Random Engine.IO / Socket.IO session id.
pub fn session_id() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), SID_LEN)
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn send(socket: &mut WebSocket<TcpStream>, packet: &Packet) -> Result<()> {
    socket.send(Message::Text(packet.encode()?))?;
    Ok(())
}

fn send_market_data(socket: &mut WebSocket<TcpStream>, data: &MarketData) -> Result<()> {
    send(socket, &Packet::event(MARKET_DATA, vec![serde_json::to_value(data)?]))
}

/// Serve one downstream consumer until it leaves.
///
/// `events` must already be subscribed so nothing published after the initial
/// snapshot is lost. Errors end only this session.
pub fn handle_client_stream(
    stream: TcpStream,
    peer: SocketAddr,
    store: &MarketStore,
    events: Subscription,
    config: &SessionConfig,
) -> Result<()> {
    let control = stream.try_clone()?;
    control.set_read_timeout(Some(config.handshake_timeout))?;
    control.set_write_timeout(Some(config.handshake_timeout))?;

    let mut socket =
        tungstenite::accept(stream).map_err(|e| RelayError::Handshake(e.to_string()))?;
    control.set_read_timeout(Some(SESSION_POLL_INTERVAL))?;

    let sid = session_id();
    send(
        &mut socket,
        &Packet::Open(Handshake {
            sid: sid.clone(),
            upgrades: Vec::new(),
            ping_interval: config.ping_interval.as_millis() as u64,
            ping_timeout: config.ping_timeout.as_millis() as u64,
            max_payload: MAX_PAYLOAD,
        }),
    )?;

    if !await_connect(&mut socket, config.handshake_timeout)? {
        debug!("{} left before connecting", peer);
        return Ok(());
    }
    send(&mut socket, &Packet::Connect(Some(json!({ "sid": session_id() }))))?;
    info!("Consumer {} connected (sid {})", peer, sid);

    let snapshot = store.snapshot()?;
    let tickers = snapshot.tickers();
    if !tickers.is_empty() {
        send_market_data(
            &mut socket,
            &MarketData {
                tickers,
                time: snapshot.time,
            },
        )?;
    }

    let mut heartbeat = Heartbeat::new(config.ping_interval, config.ping_timeout, Instant::now());
    let result = stream_loop(&mut socket, peer, &events, &mut heartbeat);
    let _ = socket.close(None);
    let _ = socket.flush();
    info!("Consumer {} disconnected", peer);
    result
}

/// Wait for the consumer's Socket.IO connect. `Ok(false)` when it hangs up first.
fn await_connect(socket: &mut WebSocket<TcpStream>, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match socket.read() {
            Ok(Message::Text(text)) => match Packet::decode(&text) {
                Ok(Packet::Connect(_)) => return Ok(true),
                Ok(Packet::Close) | Ok(Packet::Disconnect) => return Ok(false),
                Ok(other) => debug!("Ignoring {:?} before connect", other),
                Err(e) => debug!("Undecodable frame before connect: {}", e),
            },
            Ok(Message::Close(_)) => return Ok(false),
            Ok(_) => {}
            Err(tungstenite::Error::Io(e)) if is_timeout(&e) => {}
            Err(tungstenite::Error::ConnectionClosed) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
    }
    Err(RelayError::Handshake("no socket.io connect received".to_string()))
}

fn stream_loop(
    socket: &mut WebSocket<TcpStream>,
    peer: SocketAddr,
    events: &Subscription,
    heartbeat: &mut Heartbeat,
) -> Result<()> {
    loop {
        loop {
            match events.try_recv() {
                Ok(event) => send_market_data(socket, &event)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        match heartbeat.poll(Instant::now()) {
            HeartbeatAction::SendPing => send(socket, &Packet::Ping)?,
            HeartbeatAction::Expired => {
                info!("Consumer {} missed its pong", peer);
                return Ok(());
            }
            HeartbeatAction::Idle => {}
        }

        match socket.read() {
            Ok(Message::Text(text)) => match Packet::decode(&text) {
                Ok(Packet::Pong) => heartbeat.pong_received(Instant::now()),
                Ok(Packet::Ping) => send(socket, &Packet::Pong)?,
                Ok(Packet::Close) | Ok(Packet::Disconnect) => return Ok(()),
                Ok(other) => {
                    heartbeat.record_activity(Instant::now());
                    debug!("Ignoring {:?} from {}", other, peer);
                }
                Err(e) => debug!("Undecodable frame from {}: {}", peer, e),
            },
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => heartbeat.record_activity(Instant::now()),
            Err(tungstenite::Error::Io(e)) if is_timeout(&e) => {}
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::broadcast::{Broadcaster, Publisher};
    use market_common::Ticker;
    use market_common::feed::{Connector, FeedConfig, FeedEvent, FeedSession, Polled};
    use market_common::transport::SocketIoConnector;
    use serde_json::Value;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;
    use tungstenite::stream::MaybeTlsStream;

    type Client = WebSocket<MaybeTlsStream<TcpStream>>;

    fn start_session(
        store: Arc<MarketStore>,
        broadcaster: Arc<Broadcaster>,
        config: SessionConfig,
    ) -> (SocketAddr, thread::JoinHandle<Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, peer) = listener.accept().unwrap();
            let events = broadcaster.subscribe();
            handle_client_stream(stream, peer, &store, events, &config)
        });
        (addr, handle)
    }

    fn connect(addr: SocketAddr) -> Client {
        let url = format!("ws://{}/socket.io/?EIO=4&transport=websocket", addr);
        let (mut client, _) = tungstenite::connect(url).unwrap();
        if let MaybeTlsStream::Plain(stream) = client.get_mut() {
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        }
        client
    }

    fn next_packet(client: &mut Client) -> Packet {
        loop {
            if let Message::Text(text) = client.read().unwrap() {
                return Packet::decode(&text).unwrap();
            }
        }
    }

    fn send_text(client: &mut Client, text: &str) {
        client.send(Message::Text(text.to_string())).unwrap();
    }

    fn market_data(packet: Packet) -> Value {
        match packet {
            Packet::Event { name, mut args } if name == MARKET_DATA => args.remove(0),
            other => panic!("expected market_data, got {:?}", other),
        }
    }

    fn ticker(code: &str, buy: f64) -> Ticker {
        Ticker {
            symbol: code.to_string(),
            code: code.to_string(),
            price: buy,
            buy,
            sell: buy,
            change_percent: 0.0,
        }
    }

    #[test]
    fn handshake_then_snapshot_then_broadcasts() {
        let store = Arc::new(MarketStore::new());
        store
            .merge("ONS", serde_json::from_value(json!({"alis": "2000", "satis": "2001"})).unwrap())
            .unwrap();
        store.set_time("10:00:00".to_string()).unwrap();
        let broadcaster = Arc::new(Broadcaster::new(8));
        let (addr, server) =
            start_session(store, Arc::clone(&broadcaster), SessionConfig::default());

        let mut client = connect(addr);
        match next_packet(&mut client) {
            Packet::Open(handshake) => {
                assert_eq!(handshake.sid.len(), SID_LEN);
                assert_eq!(handshake.ping_interval, 25_000);
                assert!(handshake.upgrades.is_empty());
            }
            other => panic!("expected open, got {:?}", other),
        }

        send_text(&mut client, "40");
        assert!(matches!(next_packet(&mut client), Packet::Connect(Some(_))));

        let snapshot = market_data(next_packet(&mut client));
        assert_eq!(snapshot["time"], "10:00:00");
        assert_eq!(snapshot["tickers"][0]["symbol"], "Altın Ons");
        assert_eq!(snapshot["tickers"][0]["changePercent"], 0.0);

        while broadcaster.subscriber_count() == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        broadcaster.publish(vec![ticker("ALTIN", 2500.0)], Some("10:00:01".to_string()));
        let update = market_data(next_packet(&mut client));
        assert_eq!(update["tickers"][0]["code"], "ALTIN");
        assert_eq!(update["time"], "10:00:01");

        send_text(&mut client, "41");
        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn empty_store_sends_no_initial_snapshot() {
        let store = Arc::new(MarketStore::new());
        let broadcaster = Arc::new(Broadcaster::new(8));
        let (addr, server) =
            start_session(store, Arc::clone(&broadcaster), SessionConfig::default());

        let mut client = connect(addr);
        assert!(matches!(next_packet(&mut client), Packet::Open(_)));
        send_text(&mut client, "40");
        assert!(matches!(next_packet(&mut client), Packet::Connect(Some(_))));

        broadcaster.publish(vec![ticker("ONS", 1.0)], None);
        let first = market_data(next_packet(&mut client));
        assert_eq!(first["tickers"][0]["code"], "ONS");
        assert!(first["time"].is_null());

        client.close(None).unwrap();
        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn consumer_that_never_pongs_is_dropped() {
        let store = Arc::new(MarketStore::new());
        let broadcaster = Arc::new(Broadcaster::new(8));
        let config = SessionConfig {
            ping_interval: Duration::from_millis(100),
            ping_timeout: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(5),
        };
        let (addr, server) = start_session(store, broadcaster, config);

        let mut client = connect(addr);
        assert!(matches!(next_packet(&mut client), Packet::Open(_)));
        send_text(&mut client, "40");
        assert!(matches!(next_packet(&mut client), Packet::Connect(Some(_))));
        assert_eq!(next_packet(&mut client), Packet::Ping);

        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn answered_pings_keep_the_session_alive() {
        let store = Arc::new(MarketStore::new());
        let broadcaster = Arc::new(Broadcaster::new(8));
        let config = SessionConfig {
            ping_interval: Duration::from_millis(50),
            ping_timeout: Duration::from_millis(200),
            handshake_timeout: Duration::from_secs(5),
        };
        let (addr, server) = start_session(store, broadcaster, config);

        let mut client = connect(addr);
        assert!(matches!(next_packet(&mut client), Packet::Open(_)));
        send_text(&mut client, "40");
        assert!(matches!(next_packet(&mut client), Packet::Connect(Some(_))));
        for _ in 0..3 {
            assert_eq!(next_packet(&mut client), Packet::Ping);
            send_text(&mut client, "3");
        }
        assert!(!server.is_finished());

        send_text(&mut client, "41");
        assert!(server.join().unwrap().is_ok());
    }

    fn next_feed_event<S: FeedSession>(session: &mut S) -> FeedEvent {
        for _ in 0..100 {
            match session.poll_event().unwrap() {
                Polled::Event(event) => return event,
                Polled::Idle => {}
                Polled::Closed => panic!("session closed before any event"),
            }
        }
        panic!("no event within the polling budget");
    }

    #[test]
    fn feed_connector_receives_snapshot_from_a_relay_session() {
        let store = Arc::new(MarketStore::new());
        store
            .merge("ONS", serde_json::from_value(json!({"alis": "2000", "satis": "2001"})).unwrap())
            .unwrap();
        let broadcaster = Arc::new(Broadcaster::new(8));
        let (addr, server) =
            start_session(store, Arc::clone(&broadcaster), SessionConfig::default());

        let mut connector = SocketIoConnector::new(FeedConfig {
            url: format!("http://{}", addr),
            origin: "https://o.example".to_string(),
            connect_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(10),
        });
        let mut session = connector.connect().unwrap();

        let snapshot = next_feed_event(&mut session);
        assert_eq!(snapshot.name, MARKET_DATA);
        assert_eq!(snapshot.args[0]["tickers"][0]["symbol"], "Altın Ons");

        broadcaster.publish(vec![ticker("ALTIN", 2500.0)], Some("10:00:01".to_string()));
        let update = next_feed_event(&mut session);
        assert_eq!(update.args[0]["tickers"][0]["code"], "ALTIN");
        assert_eq!(update.args[0]["time"], "10:00:01");

        session.close();
        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn session_ids_are_random_alphanumeric() {
        let a = session_id();
        let b = session_id();
        assert_eq!(a.len(), SID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
