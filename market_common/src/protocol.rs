//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Both websockets in the system speak the same framing: every text frame is
//! one Engine.IO packet whose first character is its type. Message packets
//! (`4`) carry a Socket.IO packet whose first character is, again, its type.
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,..}   open
//! 2 / 3                                   ping / pong
//! 40 / 40{"sid":".."}                     connect (request / ack)
//! 42["price_changed",{..}]                event
//! ```
//!
//! Only text frames are used. Namespace prefixes and acknowledgement ids are
//! skipped on decode; binary packets are rejected with `RelayError::Protocol`.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;

/// Engine.IO protocol revision spoken on both ends.
pub const ENGINE_IO_VERSION: u8 = 4;
/// Upstream event requesting the full price table.
pub const SNAPSHOT_REQUEST: &str = "get_all_prices";
/// Upstream event carrying price changes.
pub const PRICE_CHANGED: &str = "price_changed";
/// Downstream event carrying normalized tickers.
pub const MARKET_DATA: &str = "market_data";

/// Payload of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id.
    pub sid: String,
    /// Transports the server offers to upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    /// Largest payload the server accepts, in bytes.
    #[serde(default)]
    pub max_payload: u64,
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO open, server → client.
    Open(Handshake),
    /// Engine.IO close.
    Close,
    /// Engine.IO ping.
    Ping,
    /// Engine.IO pong.
    Pong,
    /// Engine.IO noop (also used for upgrade probes we do not take part in).
    Noop,
    /// Socket.IO connect; the server's reply carries `{"sid": ..}`.
    Connect(Option<Value>),
    /// Socket.IO disconnect.
    Disconnect,
    /// Socket.IO event with its name and arguments.
    Event {
        /// Event name, the first array element on the wire.
        name: String,
        /// Remaining array elements.
        args: Vec<Value>,
    },
    /// Socket.IO connect refusal.
    ConnectError(Value),
}

impl Packet {
    /// Build an event packet.
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        Packet::Event {
            name: name.to_string(),
            args,
        }
    }

    /// Encode to the text frame sent on the websocket.
    pub fn encode(&self) -> Result<String, RelayError> {
        let frame = match self {
            Packet::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(data)) => format!("40{}", serde_json::to_string(data)?),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, args } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                format!("42{}", serde_json::to_string(&items)?)
            }
            Packet::ConnectError(data) => format!("44{}", serde_json::to_string(data)?),
        };
        Ok(frame)
    }

    /// Decode one text frame.
    pub fn decode(frame: &str) -> Result<Self, RelayError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| RelayError::Protocol("empty frame".to_string()))?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '5' | '6' => Ok(Packet::Noop),
            '4' => Self::decode_message(rest),
            other => Err(RelayError::Protocol(format!(
                "unknown engine.io packet type {:?}",
                other
            ))),
        }
    }

    fn decode_message(message: &str) -> Result<Self, RelayError> {
        let mut chars = message.chars();
        let kind = chars
            .next()
            .ok_or_else(|| RelayError::Protocol("empty socket.io packet".to_string()))?;
        let body = skip_ack_id(skip_namespace(chars.as_str()));

        match kind {
            '0' if body.is_empty() => Ok(Packet::Connect(None)),
            '0' => Ok(Packet::Connect(Some(serde_json::from_str(body)?))),
            '1' => Ok(Packet::Disconnect),
            '2' => {
                let mut items: Vec<Value> = serde_json::from_str(body)?;
                if items.is_empty() {
                    return Err(RelayError::Protocol("event without a name".to_string()));
                }
                match items.remove(0) {
                    Value::String(name) => Ok(Packet::Event { name, args: items }),
                    other => Err(RelayError::Protocol(format!(
                        "event name is not a string: {}",
                        other
                    ))),
                }
            }
            '4' => Ok(Packet::ConnectError(
                serde_json::from_str(body).unwrap_or(Value::Null),
            )),
            other => Err(RelayError::Protocol(format!(
                "unsupported socket.io packet type {:?}",
                other
            ))),
        }
    }
}

/// Drop a `/namespace,` prefix; only the default namespace is served.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn skip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let packet = Packet::decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let handshake = match packet {
            Packet::Open(handshake) => handshake,
            other => panic!("expected open, got {:?}", other),
        };
        assert_eq!(handshake.sid, "abc");
        assert_eq!(handshake.ping_interval, 25000);
        assert_eq!(handshake.ping_timeout, 20000);
    }

    #[test]
    fn decodes_heartbeat_and_connect() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("2probe").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
        assert_eq!(Packet::decode("40").unwrap(), Packet::Connect(None));
        assert_eq!(
            Packet::decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Packet::Connect(Some(json!({"sid": "xyz"})))
        );
        assert_eq!(Packet::decode("41").unwrap(), Packet::Disconnect);
    }

    #[test]
    fn decodes_price_event() {
        let packet =
            Packet::decode(r#"42["price_changed",{"data":{"ONS":{"alis":"1"}}}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::event(PRICE_CHANGED, vec![json!({"data": {"ONS": {"alis": "1"}}})])
        );
    }

    #[test]
    fn decodes_event_with_namespace_and_ack_id() {
        let packet = Packet::decode(r#"42/prices,17["tick",1]"#).unwrap();
        assert_eq!(packet, Packet::event("tick", vec![json!(1)]));
    }

    #[test]
    fn encodes_events_and_connect() {
        assert_eq!(
            Packet::event(SNAPSHOT_REQUEST, vec![]).encode().unwrap(),
            r#"42["get_all_prices"]"#
        );
        assert_eq!(
            Packet::event(MARKET_DATA, vec![json!({"time": null})]).encode().unwrap(),
            r#"42["market_data",{"time":null}]"#
        );
        assert_eq!(Packet::Connect(None).encode().unwrap(), "40");
        assert_eq!(Packet::Ping.encode().unwrap(), "2");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Packet::decode(""), Err(RelayError::Protocol(_))));
        assert!(matches!(Packet::decode("9"), Err(RelayError::Protocol(_))));
        assert!(matches!(Packet::decode("42[]"), Err(RelayError::Protocol(_))));
        assert!(matches!(Packet::decode("42[5]"), Err(RelayError::Protocol(_))));
        assert!(matches!(Packet::decode("43[]"), Err(RelayError::Protocol(_))));
        assert!(matches!(Packet::decode("42{oops"), Err(RelayError::SerdeJson(_))));
    }
}
