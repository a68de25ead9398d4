//! Bayeux protocol engine.
//!
//! Builds the outbound meta and publish frames and holds the session state
//! they depend on: the server-assigned `clientId`, the connection state and
//! the message id counter.
//!
//! # Write serialization
//!
//! Every outbound frame goes through one `Mutex` that also owns the
//! [`MessageCounter`]: the id is taken, the batch encoded and handed to the
//! transport under the same guard, so two frames never interleave and ids
//! reach the wire in order. The inbound path never takes this lock.
//!
//! Operations whose preconditions are unmet (no `clientId`, not connected)
//! are silent no-ops, except [`ProtocolEngine::subscribe`], which reports
//! [`ClientError::ClientIdNotValid`] so the subscription manager can retry or
//! queue.

// Rust guideline compliant 2026-02

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::bayeux::{encode_batch, Message};
use crate::error::{ClientError, Result};
use crate::subscription::SubscriptionModel;
use crate::transport::Transport;

/// Protocol-level connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// Handshake sent, waiting for the reply.
    Handshaking,
    /// Handshake accepted and the connect cycle is running.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Handshaking => write!(f, "handshaking"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Message id sequence.
///
/// Increments before each use and wraps to 0 instead of reaching `u32::MAX`,
/// so the first id is "1" and the id after "4294967294" is "0".
#[derive(Debug, Default)]
pub struct MessageCounter {
    value: u32,
}

impl MessageCounter {
    /// Counter that has not issued any id yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn starting_at(value: u32) -> Self {
        Self { value }
    }

    /// The next id, as a decimal string.
    pub fn next_id(&mut self) -> String {
        self.value += 1;
        if self.value == u32::MAX {
            self.value = 0;
        }
        self.value.to_string()
    }
}

/// Outbound half of the protocol, as seen by the subscription manager,
/// the resolver and the transport adapter.
pub trait ProtocolEngine: Send + Sync {
    /// Server-assigned client id, once a handshake reply carried one.
    fn client_id(&self) -> Option<String>;

    /// Record (or clear) the client id.
    fn set_client_id(&self, client_id: Option<String>);

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Move to `state`.
    fn set_state(&self, state: ConnectionState);

    /// Whether the session is [`ConnectionState::Connected`].
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether a transport connection attempt is in flight.
    fn connection_initiated(&self) -> bool;

    /// Set or clear the connection-attempt flag.
    fn set_connection_initiated(&self, initiated: bool);

    /// Authentication fields for the next handshake.
    fn handshake_fields(&self) -> Option<Value>;

    /// Store the authentication fields for handshakes.
    fn set_handshake_fields(&self, fields: Value);

    /// Send `/meta/handshake`. Logged no-op without fields.
    fn start_handshake(&self, fields: Option<Value>);

    /// Send `/meta/connect`. No-op without a client id.
    fn connect(&self);

    /// Send `/meta/disconnect`. No-op unless connected with a client id.
    fn disconnect(&self);

    /// Send one `/meta/subscribe` per model in a single frame.
    fn subscribe(&self, models: &[SubscriptionModel]) -> Result<()>;

    /// Send `/meta/unsubscribe` for `channel`. No-op without a client id.
    fn unsubscribe(&self, channel: &str);

    /// Publish `data` on `channel`. Dropped unless connected with a client id.
    fn publish(&self, data: Value, channel: &str);

    /// Ping the server at the transport level.
    fn send_ping(&self, data: Vec<u8>);

    /// Ask the transport to connect.
    fn open_connection(&self);

    /// Ask the transport to close.
    fn close_connection(&self);
}

/// Session state read by every handler.
#[derive(Debug, Default)]
struct Session {
    client_id: Option<String>,
    state: ConnectionState,
    connection_initiated: bool,
    handshake_fields: Option<Value>,
}

/// [`ProtocolEngine`] writing to a [`Transport`].
#[derive(Debug)]
pub struct BayeuxEngine {
    transport: Arc<dyn Transport>,
    connect_timeout_ms: u64,
    session: RwLock<Session>,
    writer: Mutex<MessageCounter>,
}

impl BayeuxEngine {
    /// Create an engine writing to `transport`, advertising
    /// `connect_timeout_ms` as the connect advice timeout.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, connect_timeout_ms: u64) -> Self {
        Self {
            transport,
            connect_timeout_ms,
            session: RwLock::new(Session::default()),
            writer: Mutex::new(MessageCounter::new()),
        }
    }

    /// Build and write one frame under the write lock. `build` receives the
    /// id counter so ids are issued in wire order.
    fn write(&self, build: impl FnOnce(&mut MessageCounter) -> Vec<Message>) -> Result<()> {
        let mut counter = self.writer.lock().expect("writer lock poisoned");
        let frame = encode_batch(&build(&mut counter))?;
        log::trace!("[Bayeux] >> {}", frame);
        self.transport.write_string(frame);
        Ok(())
    }

    fn write_logged(&self, what: &str, build: impl FnOnce(&mut MessageCounter) -> Vec<Message>) {
        if let Err(e) = self.write(build) {
            log::error!("[Bayeux] Failed to send {}: {}", what, e);
        }
    }

    fn connected_client_id(&self) -> Option<String> {
        let session = self.session.read().expect("session lock poisoned");
        if session.state == ConnectionState::Connected {
            session.client_id.clone()
        } else {
            None
        }
    }
}

impl ProtocolEngine for BayeuxEngine {
    fn client_id(&self) -> Option<String> {
        self.session
            .read()
            .expect("session lock poisoned")
            .client_id
            .clone()
    }

    fn set_client_id(&self, client_id: Option<String>) {
        self.session.write().expect("session lock poisoned").client_id = client_id;
    }

    fn state(&self) -> ConnectionState {
        self.session.read().expect("session lock poisoned").state
    }

    fn set_state(&self, state: ConnectionState) {
        let mut session = self.session.write().expect("session lock poisoned");
        if session.state != state {
            log::debug!("[Bayeux] State {} -> {}", session.state, state);
            session.state = state;
        }
    }

    fn connection_initiated(&self) -> bool {
        self.session
            .read()
            .expect("session lock poisoned")
            .connection_initiated
    }

    fn set_connection_initiated(&self, initiated: bool) {
        self.session
            .write()
            .expect("session lock poisoned")
            .connection_initiated = initiated;
    }

    fn handshake_fields(&self) -> Option<Value> {
        self.session
            .read()
            .expect("session lock poisoned")
            .handshake_fields
            .clone()
    }

    fn set_handshake_fields(&self, fields: Value) {
        self.session
            .write()
            .expect("session lock poisoned")
            .handshake_fields = Some(fields);
    }

    fn start_handshake(&self, fields: Option<Value>) {
        let Some(fields) = fields else {
            log::warn!("[Bayeux] Handshake skipped: no authentication fields");
            return;
        };

        log::debug!("[Bayeux] Starting handshake");
        self.set_state(ConnectionState::Handshaking);
        self.write_logged("handshake", |_| vec![Message::handshake(fields)]);
    }

    fn connect(&self) {
        let Some(client_id) = self.client_id() else {
            return;
        };

        self.write_logged("connect", |counter| {
            vec![Message::connect(
                counter.next_id(),
                &client_id,
                self.connect_timeout_ms,
            )]
        });
    }

    fn disconnect(&self) {
        let Some(client_id) = self.connected_client_id() else {
            log::debug!("[Bayeux] Disconnect skipped: not connected");
            return;
        };

        self.write_logged("disconnect", |counter| {
            vec![Message::disconnect(counter.next_id(), &client_id)]
        });
    }

    fn subscribe(&self, models: &[SubscriptionModel]) -> Result<()> {
        let Some(client_id) = self.client_id() else {
            return Err(ClientError::ClientIdNotValid);
        };
        if models.is_empty() {
            return Ok(());
        }

        self.write(|_| {
            models
                .iter()
                .map(|model| {
                    Message::subscribe(
                        model.channel_kind.meta_channel(),
                        &client_id,
                        model.sequence_id,
                        &model.subscription_url,
                    )
                })
                .collect()
        })
    }

    fn unsubscribe(&self, channel: &str) {
        let Some(client_id) = self.client_id() else {
            log::debug!("[Bayeux] Unsubscribe from {} skipped: no client id", channel);
            return;
        };

        self.write_logged("unsubscribe", |_| {
            vec![Message::unsubscribe(&client_id, channel)]
        });
    }

    fn publish(&self, data: Value, channel: &str) {
        let Some(client_id) = self.connected_client_id() else {
            log::debug!("[Bayeux] Publish to {} dropped: not connected", channel);
            return;
        };

        self.write_logged("publish", |counter| {
            vec![Message::publish(channel, &client_id, counter.next_id(), data)]
        });
    }

    fn send_ping(&self, data: Vec<u8>) {
        let _guard = self.writer.lock().expect("writer lock poisoned");
        self.transport.send_ping(data);
    }

    fn open_connection(&self) {
        let _guard = self.writer.lock().expect("writer lock poisoned");
        self.transport.open_connection();
    }

    fn close_connection(&self) {
        let _guard = self.writer.lock().expect("writer lock poisoned");
        self.transport.close_connection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::ChannelKind;
    use crate::transport::RecordingTransport;
    use serde_json::json;

    fn engine() -> (BayeuxEngine, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let engine = BayeuxEngine::new(Arc::clone(&transport) as Arc<dyn Transport>, 10_000);
        (engine, transport)
    }

    fn connected_engine() -> (BayeuxEngine, Arc<RecordingTransport>) {
        let (engine, transport) = engine();
        engine.set_client_id(Some("c1".to_string()));
        engine.set_state(ConnectionState::Connected);
        (engine, transport)
    }

    fn model(url: &str, sequence_id: u64) -> SubscriptionModel {
        SubscriptionModel {
            subscription_url: url.to_string(),
            channel_kind: ChannelKind::Subscribe,
            client_id: Some("c1".to_string()),
            sequence_id,
        }
    }

    #[test]
    fn test_message_counter_starts_at_one() {
        let mut counter = MessageCounter::new();
        let ids: Vec<String> = (0..5).map(|_| counter.next_id()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_message_counter_wraps_before_max() {
        let mut counter = MessageCounter::starting_at(u32::MAX - 2);
        assert_eq!(counter.next_id(), "4294967294");
        assert_eq!(counter.next_id(), "0");
        assert_eq!(counter.next_id(), "1");
    }

    #[test]
    fn test_handshake_without_fields_writes_nothing() {
        let (engine, transport) = engine();
        engine.start_handshake(None);
        assert!(transport.frames().is_empty());
        assert_eq!(engine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_handshake_is_single_element_array() {
        let (engine, transport) = engine();
        engine.start_handshake(Some(json!({"token": "secret"})));

        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        let batch: Vec<Value> = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0]["channel"], "/meta/handshake");
        assert_eq!(batch[0]["ext"]["authentication"]["token"], "secret");
        assert_eq!(engine.state(), ConnectionState::Handshaking);
    }

    #[test]
    fn test_connect_requires_client_id() {
        let (engine, transport) = engine();
        engine.connect();
        assert!(transport.frames().is_empty());

        engine.set_client_id(Some("c1".to_string()));
        engine.connect();
        let connects = transport.messages_on("/meta/connect");
        assert_eq!(connects.len(), 1);
        assert_eq!(connects[0]["id"], "1");
        assert_eq!(connects[0]["clientId"], "c1");
        assert_eq!(connects[0]["advice"]["timeout"], 10_000);
    }

    #[test]
    fn test_disconnect_requires_connected_state() {
        let (engine, transport) = engine();
        engine.set_client_id(Some("c1".to_string()));
        engine.disconnect();
        assert!(transport.frames().is_empty());

        engine.set_state(ConnectionState::Connected);
        engine.disconnect();
        assert_eq!(transport.messages_on("/meta/disconnect").len(), 1);
    }

    #[test]
    fn test_subscribe_without_client_id_fails() {
        let (engine, transport) = engine();
        let result = engine.subscribe(&[model("/foo", 1)]);
        assert!(matches!(result, Err(ClientError::ClientIdNotValid)));
        assert!(transport.frames().is_empty());
    }

    #[test]
    fn test_subscribe_batches_models_in_one_frame() {
        let (engine, transport) = connected_engine();
        engine
            .subscribe(&[model("/foo", 1), model("/bar", 2)])
            .unwrap();

        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        let batch: Vec<Value> = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0]["subscription"], "/foo");
        assert_eq!(batch[0]["id"], 1);
        assert_eq!(
            batch[0]["channel"],
            ChannelKind::Subscribe.meta_channel().as_str()
        );
        assert_eq!(batch[1]["subscription"], "/bar");
        assert_eq!(batch[1]["id"], 2);
    }

    #[test]
    fn test_publish_dropped_when_not_connected() {
        let (engine, transport) = engine();
        engine.set_client_id(Some("c1".to_string()));
        engine.publish(json!({"a": 1}), "/foo");
        assert!(transport.frames().is_empty());
    }

    #[test]
    fn test_publish_and_connect_share_id_sequence() {
        let (engine, transport) = connected_engine();
        engine.connect();
        engine.publish(json!({"a": 1}), "/foo");
        engine.connect();

        let ids: Vec<Value> = transport
            .messages()
            .iter()
            .map(|m| m["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("1"), json!("2"), json!("3")]);
    }

    #[test]
    fn test_unsubscribe_requires_client_id() {
        let (engine, transport) = engine();
        engine.unsubscribe("/foo");
        assert!(transport.frames().is_empty());

        engine.set_client_id(Some("c1".to_string()));
        engine.unsubscribe("/foo");
        let unsubscribes = transport.messages_on("/meta/unsubscribe");
        assert_eq!(unsubscribes.len(), 1);
        assert_eq!(unsubscribes[0]["subscription"], "/foo");
    }
}
