//! Engine.IO v4 / Socket.IO v5 text framing.

use serde::Deserialize;
use serde_json::Value;

use crate::error::PacketError;
use crate::event::ClientEvent;

/// Socket.IO connect request for the default namespace.
pub const CONNECT: &str = "40";
pub const PONG: &str = "3";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Value),
    Disconnect,
    Event { name: String, payload: Value },
    Ack,
    ConnectError(Value),
}

pub fn decode(frame: &str) -> Result<EnginePacket, PacketError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|err| PacketError::Payload(format!("open packet: {err}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(PacketError::UnknownEngineType(other)),
    }
}

fn decode_socket(body: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let mut rest = chars.as_str();

    // Optional namespace, e.g. `/admin,`.
    if rest.starts_with('/') {
        rest = rest.split_once(',').map(|(_, tail)| tail).unwrap_or("");
    }
    // Optional ack id.
    rest = rest.trim_start_matches(|ch: char| ch.is_ascii_digit());

    match kind {
        '0' => Ok(SocketPacket::Connect(parse_optional(rest)?)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => decode_event(rest),
        '3' => Ok(SocketPacket::Ack),
        '4' => Ok(SocketPacket::ConnectError(parse_optional(rest)?)),
        '5' | '6' => Err(PacketError::Binary),
        other => Err(PacketError::UnknownSocketType(other)),
    }
}

fn parse_optional(raw: &str) -> Result<Value, PacketError> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw).map_err(|err| PacketError::Payload(err.to_string()))
}

fn decode_event(raw: &str) -> Result<SocketPacket, PacketError> {
    let value = parse_optional(raw)?;
    let Value::Array(mut items) = value else {
        return Err(PacketError::Payload("event is not an array".to_string()));
    };
    if items.is_empty() {
        return Err(PacketError::Payload("event without a name".to_string()));
    }

    let name = match items.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(PacketError::Payload(format!("event name is not a string: {other}")));
        }
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.swap_remove(0)
    };

    Ok(SocketPacket::Event { name, payload })
}

pub fn encode_event(event: &ClientEvent) -> String {
    let mut items = vec![Value::String(event.name().to_string())];
    if let Some(payload) = event.payload() {
        items.push(payload);
    }
    format!("42{}", Value::Array(items))
}

/// Human readable reason carried by a `44` connect error packet.
pub fn connect_error_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let packet = decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#)
            .expect("open packet decodes");
        assert_eq!(
            packet,
            EnginePacket::Open(OpenHandshake {
                sid: "abc".to_string(),
                ping_interval: 25000,
                ping_timeout: 20000,
            })
        );
    }

    #[test]
    fn decodes_events_with_and_without_payload() {
        let packet = decode(r#"42["file_update",{"path":"a.md","content":"x"}]"#).expect("event decodes");
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                name: "file_update".to_string(),
                payload: json!({"path": "a.md", "content": "x"}),
            })
        );

        let packet = decode(r#"42["thinking"]"#).expect("bare event decodes");
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                name: "thinking".to_string(),
                payload: Value::Null,
            })
        );
    }

    #[test]
    fn tolerates_namespace_and_ack_id() {
        let packet = decode(r#"42/chat,17["new_message",{"sender":"assistant"}]"#).expect("decodes");
        let EnginePacket::Message(SocketPacket::Event { name, .. }) = packet else {
            panic!("expected event, got {packet:?}");
        };
        assert_eq!(name, "new_message");
    }

    #[test]
    fn decodes_connect_and_connect_error() {
        assert_eq!(
            decode(r#"40{"sid":"s1"}"#).expect("connect decodes"),
            EnginePacket::Message(SocketPacket::Connect(json!({"sid": "s1"})))
        );
        let packet = decode(r#"44{"message":"Not authorized"}"#).expect("error decodes");
        let EnginePacket::Message(SocketPacket::ConnectError(payload)) = packet else {
            panic!("expected connect error");
        };
        assert_eq!(connect_error_message(&payload), "Not authorized");
    }

    #[test]
    fn control_packets_and_failures() {
        assert_eq!(decode("2").expect("ping"), EnginePacket::Ping);
        assert_eq!(decode("6").expect("noop"), EnginePacket::Noop);
        assert!(matches!(decode(""), Err(PacketError::Empty)));
        assert!(matches!(decode("9"), Err(PacketError::UnknownEngineType('9'))));
        assert!(matches!(decode(r#"451-["upload",{"_placeholder":true,"num":0}]"#), Err(PacketError::Binary)));
        assert!(matches!(decode(r#"42{"not":"array"}"#), Err(PacketError::Payload(_))));
    }

    #[test]
    fn encodes_client_events() {
        assert_eq!(encode_event(&ClientEvent::GetMessageHistory), r#"42["get_message_history"]"#);
        assert_eq!(
            encode_event(&ClientEvent::SendMessage {
                message: "hi".to_string()
            }),
            r#"42["send_message",{"message":"hi"}]"#
        );
    }
}
