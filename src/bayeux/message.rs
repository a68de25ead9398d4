//! Bayeux message record and batch codec.
//!
//! A single struct covers every message kind; fields a kind does not use stay
//! `None` and are never serialized, so each outbound frame carries exactly the
//! fields its kind requires.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::channel::{MetaChannel, SUPPORTED_CONNECTION_TYPES, WEBSOCKET_CONNECTION_TYPE};
use crate::constants::{
    BAYEUX_MINIMUM_VERSION, BAYEUX_VERSION, HANDSHAKE_ADVICE_INTERVAL_MS,
    HANDSHAKE_ADVICE_TIMEOUT_MS,
};

/// Server guidance on how to proceed after a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    /// Do not reconnect.
    None,
    /// Keep the session alive by issuing another connect.
    Retry,
    /// The session is gone; a new handshake is required.
    Handshake,
    /// Any value this client does not understand.
    #[serde(other)]
    Unknown,
}

/// The `advice` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    /// Delay before the next connect, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// How long the server may hold a connect, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Reconnect policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<Reconnect>,
}

/// Message `id`. Sent as a string for connect/publish and as a number for
/// subscribe; servers echo either form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Numeric id (subscription sequence ids).
    Number(u64),
    /// Decimal string id (message counter).
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One Bayeux message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Target channel. Inbound elements without one are dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Server-assigned session id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Protocol version (handshake).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Minimum accepted protocol version (handshake).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,
    /// Transport types the client supports (handshake).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,
    /// Transport type in use (connect).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// Channel being (un)subscribed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    /// Application payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Advice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    /// Extension object, opaque to the protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    /// Reply outcome. Accepts `true`/`false` or a number (`1` means success).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_successful"
    )]
    pub successful: Option<bool>,
    /// Server error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server error code, string or number depending on the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
}

fn deserialize_successful<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_u64() == Some(1)),
        Value::String(s) => Some(s == "true" || s == "1"),
        _ => None,
    }))
}

impl Message {
    /// `/meta/handshake` carrying the authentication fields in `ext`.
    #[must_use]
    pub fn handshake(fields: Value) -> Self {
        Self {
            channel: Some(MetaChannel::Handshake.as_str().to_string()),
            version: Some(BAYEUX_VERSION.to_string()),
            minimum_version: Some(BAYEUX_MINIMUM_VERSION.to_string()),
            supported_connection_types: Some(
                SUPPORTED_CONNECTION_TYPES
                    .iter()
                    .map(|t| (*t).to_string())
                    .collect(),
            ),
            ext: Some(serde_json::json!({ "authentication": fields })),
            advice: Some(Advice {
                interval: Some(HANDSHAKE_ADVICE_INTERVAL_MS),
                timeout: Some(HANDSHAKE_ADVICE_TIMEOUT_MS),
                reconnect: None,
            }),
            ..Self::default()
        }
    }

    /// `/meta/connect` over the websocket connection type.
    #[must_use]
    pub fn connect(id: String, client_id: &str, timeout_ms: u64) -> Self {
        Self {
            id: Some(MessageId::Text(id)),
            channel: Some(MetaChannel::Connect.as_str().to_string()),
            client_id: Some(client_id.to_string()),
            connection_type: Some(WEBSOCKET_CONNECTION_TYPE.to_string()),
            advice: Some(Advice {
                timeout: Some(timeout_ms),
                ..Advice::default()
            }),
            ..Self::default()
        }
    }

    /// `/meta/disconnect`.
    #[must_use]
    pub fn disconnect(id: String, client_id: &str) -> Self {
        Self {
            id: Some(MessageId::Text(id)),
            channel: Some(MetaChannel::Disconnect.as_str().to_string()),
            client_id: Some(client_id.to_string()),
            ..Self::default()
        }
    }

    /// Subscribe request for one channel on `meta`, id'd by the subscription
    /// sequence id.
    #[must_use]
    pub fn subscribe(
        meta: MetaChannel,
        client_id: &str,
        sequence_id: u64,
        subscription: &str,
    ) -> Self {
        Self {
            id: Some(MessageId::Number(sequence_id)),
            channel: Some(meta.as_str().to_string()),
            client_id: Some(client_id.to_string()),
            subscription: Some(subscription.to_string()),
            ..Self::default()
        }
    }

    /// `/meta/unsubscribe` for one channel.
    #[must_use]
    pub fn unsubscribe(client_id: &str, subscription: &str) -> Self {
        Self {
            channel: Some(MetaChannel::Unsubscribe.as_str().to_string()),
            client_id: Some(client_id.to_string()),
            subscription: Some(subscription.to_string()),
            ..Self::default()
        }
    }

    /// Application publish.
    #[must_use]
    pub fn publish(channel: &str, client_id: &str, id: String, data: Value) -> Self {
        Self {
            id: Some(MessageId::Text(id)),
            channel: Some(channel.to_string()),
            client_id: Some(client_id.to_string()),
            data: Some(data),
            ..Self::default()
        }
    }

    /// Whether the reply reports success. Absent means failure.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.successful == Some(true)
    }

    /// `advice.reconnect`, if the server sent one.
    #[must_use]
    pub fn reconnect_advice(&self) -> Option<Reconnect> {
        self.advice.as_ref().and_then(|a| a.reconnect)
    }

    /// Error code of a failed reply: top-level `code`, then `ext.code`, then
    /// the `error` text itself.
    #[must_use]
    pub fn error_code(&self) -> Option<String> {
        fn as_code(value: &Value) -> Option<String> {
            match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }

        self.code
            .as_ref()
            .and_then(as_code)
            .or_else(|| self.ext.as_ref().and_then(|ext| ext.get("code")).and_then(as_code))
            .or_else(|| self.error.clone())
    }
}

/// Encode messages as one JSON array frame.
pub fn encode_batch(messages: &[Message]) -> Result<String, serde_json::Error> {
    serde_json::to_string(messages)
}

/// Decode an inbound frame.
///
/// Accepts a JSON array or a lone object. Each element is decoded on its own:
/// an element that fails to decode or has no `channel` is logged and skipped
/// without affecting the rest of the batch.
#[must_use]
pub fn parse_batch(text: &str) -> Vec<Message> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(e) => {
            log::warn!(
                "[Bayeux] Dropping unparseable frame ({}): {}",
                e,
                text.chars().take(100).collect::<String>()
            );
            return Vec::new();
        }
    };

    let elements = match value {
        Value::Array(elements) => elements,
        object @ Value::Object(_) => vec![object],
        other => {
            log::warn!("[Bayeux] Dropping frame that is not a message batch: {}", other);
            return Vec::new();
        }
    };

    elements
        .into_iter()
        .filter_map(|element| match serde_json::from_value::<Message>(element) {
            Ok(message) if message.channel.is_some() => Some(message),
            Ok(_) => {
                log::warn!("[Bayeux] Dropping message without channel");
                None
            }
            Err(e) => {
                log::warn!("[Bayeux] Dropping malformed message: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_wire_shape() {
        let msg = Message::handshake(json!({"user": "alice", "token": "t"}));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "channel": "/meta/handshake",
                "version": "1.0",
                "minimumVersion": "1.0",
                "supportedConnectionTypes": ["long-polling", "callback-polling", "iframe", "websocket"],
                "ext": {"authentication": {"user": "alice", "token": "t"}},
                "advice": {"interval": 0, "timeout": 6000}
            })
        );
    }

    #[test]
    fn test_connect_wire_shape() {
        let msg = Message::connect("7".to_string(), "abc", 10_000);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "7",
                "channel": "/meta/connect",
                "clientId": "abc",
                "connectionType": "websocket",
                "advice": {"timeout": 10000}
            })
        );
    }

    #[test]
    fn test_subscribe_and_unsubscribe_wire_shape() {
        let sub = Message::subscribe(MetaChannel::Subscribe, "abc", 3, "/foo/bar");
        let sub = serde_json::to_value(sub).unwrap();
        assert_eq!(
            sub,
            json!({"id": 3, "channel": "/meta/subscribe", "clientId": "abc", "subscription": "/foo/bar"})
        );

        let unsub = serde_json::to_value(Message::unsubscribe("abc", "/foo/bar")).unwrap();
        assert_eq!(
            unsub,
            json!({"channel": "/meta/unsubscribe", "clientId": "abc", "subscription": "/foo/bar"})
        );
    }

    #[test]
    fn test_publish_and_disconnect_wire_shape() {
        let publish = Message::publish("/chat", "abc", "2".to_string(), json!({"text": "hi"}));
        let publish = serde_json::to_value(publish).unwrap();
        assert_eq!(
            publish,
            json!({"id": "2", "channel": "/chat", "clientId": "abc", "data": {"text": "hi"}})
        );

        let disconnect = serde_json::to_value(Message::disconnect("4".to_string(), "abc")).unwrap();
        assert_eq!(
            disconnect,
            json!({"id": "4", "channel": "/meta/disconnect", "clientId": "abc"})
        );
    }

    #[test]
    fn test_encode_batch_is_json_array() {
        let frame = encode_batch(&[Message::unsubscribe("abc", "/a")]).unwrap();
        assert!(frame.starts_with('['));
        assert!(frame.ends_with(']'));
    }

    #[test]
    fn test_successful_accepts_bool_and_number() {
        let batch = parse_batch(
            r#"[{"channel":"/meta/connect","successful":true},
                {"channel":"/meta/connect","successful":1},
                {"channel":"/meta/connect","successful":0},
                {"channel":"/meta/connect"}]"#,
        );
        let flags: Vec<bool> = batch.iter().map(Message::is_successful).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn test_parse_batch_skips_malformed_elements() {
        let batch = parse_batch(
            r#"[{"channel":"/meta/connect","clientId":42},
                {"successful":true},
                "garbage",
                {"channel":"/foo","data":{"n":1}}]"#,
        );
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].channel.as_deref(), Some("/foo"));
    }

    #[test]
    fn test_parse_batch_accepts_lone_object() {
        let batch = parse_batch(r#"{"channel":"/meta/handshake","clientId":"c1"}"#);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].client_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_parse_batch_rejects_non_json() {
        assert!(parse_batch("not json").is_empty());
        assert!(parse_batch("42").is_empty());
    }

    #[test]
    fn test_reconnect_advice_parsing() {
        let batch = parse_batch(
            r#"[{"channel":"/meta/connect","advice":{"reconnect":"retry"}},
                {"channel":"/meta/connect","advice":{"reconnect":"handshake","interval":500}},
                {"channel":"/meta/connect","advice":{"reconnect":"sideways"}}]"#,
        );
        assert_eq!(batch[0].reconnect_advice(), Some(Reconnect::Retry));
        assert_eq!(batch[1].reconnect_advice(), Some(Reconnect::Handshake));
        assert_eq!(batch[2].reconnect_advice(), Some(Reconnect::Unknown));
    }

    #[test]
    fn test_error_code_precedence() {
        let batch = parse_batch(
            r#"[{"channel":"/meta/handshake","code":"TOP","ext":{"code":"EXT"},"error":"ERR"},
                {"channel":"/meta/handshake","ext":{"code":"EXT"},"error":"ERR"},
                {"channel":"/meta/handshake","error":"ERR"},
                {"channel":"/meta/handshake","code":403}]"#,
        );
        let codes: Vec<Option<String>> = batch.iter().map(Message::error_code).collect();
        assert_eq!(
            codes,
            vec![
                Some("TOP".to_string()),
                Some("EXT".to_string()),
                Some("ERR".to_string()),
                Some("403".to_string()),
            ]
        );
    }
}
