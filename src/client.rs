//! Client facade.
//!
//! [`BayeuxClient`] wires the engine, the subscription manager, the resolver
//! and the transport adapter together and exposes the public operations.
//!
//! # Architecture
//!
//! ```text
//!   application
//!     │  handshake / subscribe_to_channel / publish / ...
//!     ▼
//!   BayeuxClient ──► BayeuxEngine ──(write lock)──► Transport ──► server
//!     │                  ▲                              │
//!     │                  │                              │ TransportEvent
//!     │   SubscriptionManager ◄── MessageResolver ◄── TransportAdapter
//!     │        ▲                       │               (pipeline task)
//!     │        └─ ReconcileTask (45 s) │
//!     ▼                                ▼
//!   ClientDelegate ◄──────────────── Notifier ──► Recorder
//! ```
//!
//! No operation waits on the network. Outcomes arrive through the
//! [`ClientDelegate`] set with [`BayeuxClient::set_delegate`].

// Rust guideline compliant 2026-02

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapter::TransportAdapter;
use crate::config::ClientConfig;
use crate::constants::PENDING_RECONCILE_INTERVAL;
use crate::engine::{BayeuxEngine, ConnectionState, ProtocolEngine};
use crate::error::ConfigError;
use crate::events::{ClientDelegate, Notifier, Recorder};
use crate::resolver::{MessageResolver, Resolver};
use crate::subscription::{
    Callback, ReconcileTask, Subscriber, Subscription, SubscriptionManager, SubscriptionModel,
    SubscriptionState,
};
use crate::transport::{EventReceiver, Transport, WebSocketTransport};

/// Bayeux client over one persistent connection.
///
/// Must be created inside a tokio runtime. Dropping it stops the background
/// tasks and closes the transport.
pub struct BayeuxClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    engine: Arc<BayeuxEngine>,
    subscriptions: Arc<SubscriptionManager>,
    notifier: Arc<Notifier>,
    pipeline: JoinHandle<()>,
    reconcile: ReconcileTask,
}

impl std::fmt::Debug for BayeuxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BayeuxClient")
            .field("url", &self.config.url)
            .field("state", &self.engine.state())
            .field("client_id", &self.engine.client_id())
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl BayeuxClient {
    /// Create a client talking WebSocket to `config.url`.
    ///
    /// Nothing is dialed until [`handshake`](Self::handshake).
    pub fn configure(
        config: ClientConfig,
        recorder: Option<Arc<dyn Recorder>>,
    ) -> Result<Self, ConfigError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(WebSocketTransport::new(&config, events_tx)?);
        log::info!("[Bayeux] Configured for {}", transport.endpoint());
        Self::with_transport(config, transport, events_rx, recorder)
    }

    /// Create a client on a caller-supplied transport. `events` must be the
    /// receiving end of the channel the transport reports to.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        events: EventReceiver,
        recorder: Option<Arc<dyn Recorder>>,
    ) -> Result<Self, ConfigError> {
        config.endpoint()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let engine = Arc::new(BayeuxEngine::new(
            Arc::clone(&transport),
            config.connect_timeout_ms,
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&engine) as Arc<dyn ProtocolEngine>
        ));
        let notifier = Arc::new(Notifier::new(recorder));

        let resolver = MessageResolver::new(
            Arc::clone(&engine) as Arc<dyn ProtocolEngine>,
            Arc::clone(&subscriptions) as Arc<dyn Subscriber>,
            Arc::clone(&notifier),
        );
        let adapter = TransportAdapter::new(
            Arc::clone(&engine) as Arc<dyn ProtocolEngine>,
            Arc::new(resolver) as Arc<dyn Resolver>,
            Arc::clone(&notifier),
        );
        let pipeline = runtime.spawn(adapter.run(events));

        let weak = Arc::downgrade(&subscriptions);
        let reconcile = ReconcileTask::spawn(weak, PENDING_RECONCILE_INTERVAL);

        Ok(Self {
            config,
            transport,
            engine,
            subscriptions,
            notifier,
            pipeline,
            reconcile,
        })
    }

    /// Store the handshake authentication fields and connect. The handshake
    /// itself is sent once the transport reports the connection is up.
    ///
    /// If the socket is still open from an earlier session that ended at the
    /// protocol level, the handshake is written on it straight away.
    pub fn handshake(&self, fields: Value) {
        self.engine.set_handshake_fields(fields.clone());

        if self.transport.is_connected()
            && self.engine.state() == ConnectionState::Disconnected
        {
            log::debug!("[Bayeux] Transport already open, handshaking on it");
            self.engine.set_connection_initiated(false);
            self.engine.start_handshake(Some(fields));
            return;
        }
        if self.engine.connection_initiated() {
            log::debug!("[Bayeux] Connection already initiated");
            return;
        }
        self.engine.set_connection_initiated(true);
        self.engine.open_connection();
    }

    /// Send subscribe requests for `models`, or queue them until the next
    /// handshake when not connected. No handles are registered.
    pub fn subscribe(&self, models: Vec<SubscriptionModel>) {
        self.subscriptions.subscribe(models);
    }

    /// A subscribe request for `channel` with the next sequence id.
    #[must_use]
    pub fn new_model(&self, channel: &str) -> SubscriptionModel {
        self.subscriptions.new_model(channel)
    }

    /// Register interest in `channel`. `callback` receives every message's
    /// `data`. Release the returned handle with
    /// [`unsubscribe_from_channel`](Self::unsubscribe_from_channel).
    pub fn subscribe_to_channel(
        &self,
        channel: &str,
        callback: Option<Callback>,
    ) -> (SubscriptionState, Subscription) {
        let model = self.subscriptions.new_model(channel);
        self.subscriptions.register_interest(model, callback)
    }

    /// Like [`subscribe_to_channel`](Self::subscribe_to_channel) with a
    /// caller-built model.
    pub fn subscribe_model(
        &self,
        model: SubscriptionModel,
        callback: Option<Callback>,
    ) -> (SubscriptionState, Subscription) {
        self.subscriptions.register_interest(model, callback)
    }

    /// Release `handle`. The channel is unsubscribed when no handles remain.
    pub fn unsubscribe_from_channel(&self, handle: &Subscription) {
        self.subscriptions.release_handle(handle);
    }

    /// Publish `data` on `channel`. Dropped when not connected.
    pub fn publish(&self, data: Value, channel: &str) {
        self.engine.publish(data, channel);
    }

    /// Unsubscribe from everything, send `/meta/disconnect` and go
    /// `Disconnected` without waiting for the reply.
    pub fn disconnect_from_server(&self) {
        self.subscriptions.release_all_handles();
        self.engine.disconnect();
        self.engine.set_state(ConnectionState::Disconnected);
    }

    /// Ping the server. The pong arrives as [`ClientDelegate::on_pong`].
    pub fn send_ping(&self, data: Vec<u8>) {
        self.engine.send_ping(data);
    }

    /// Replace the delegate.
    pub fn set_delegate(&self, delegate: Arc<dyn ClientDelegate>) {
        self.notifier.set_delegate(delegate);
    }

    /// Whether the session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// Protocol connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.engine.state()
    }

    /// Server-assigned client id, empty before the first handshake reply.
    #[must_use]
    pub fn client_id(&self) -> String {
        self.engine.client_id().unwrap_or_default()
    }

    /// Whether `channel` is acknowledged by the server.
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.is_open(channel)
    }

    /// Subscription bookkeeping, for inspection.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// The configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the periodic subscription reconciliation is still running.
    #[must_use]
    pub fn is_reconciling(&self) -> bool {
        !self.reconcile.is_finished()
    }
}

impl Drop for BayeuxClient {
    fn drop(&mut self) {
        self.pipeline.abort();
        self.transport.close_connection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::RecordingTransport;

    fn client() -> (BayeuxClient, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let client = BayeuxClient::with_transport(
            ClientConfig::new("https://example.com/cometd"),
            Arc::clone(&transport) as Arc<dyn Transport>,
            events_rx,
            None,
        )
        .unwrap();
        (client, transport)
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_url() {
        let err = BayeuxClient::configure(ClientConfig::new("/no/host"), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingHost { .. }));
    }

    #[test]
    fn test_configure_outside_runtime_fails() {
        let err =
            BayeuxClient::configure(ClientConfig::new("https://example.com/cometd"), None)
                .unwrap_err();
        assert_eq!(err, ConfigError::NoRuntime);
    }

    #[tokio::test]
    async fn test_handshake_opens_connection_once() {
        let (client, transport) = client();
        client.handshake(serde_json::json!({"token": "a"}));
        client.handshake(serde_json::json!({"token": "b"}));

        assert_eq!(transport.open_count(), 1);
        assert_eq!(
            client.engine.handshake_fields(),
            Some(serde_json::json!({"token": "b"}))
        );
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (client, transport) = client();
        assert!(!client.is_connected());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.client_id(), "");
        assert!(!client.is_subscribed("/foo"));
        assert!(client.is_reconciling());

        client.publish(serde_json::json!({"a": 1}), "/foo");
        client.disconnect_from_server();
        assert!(transport.frames().is_empty());
    }

    #[tokio::test]
    async fn test_drop_closes_transport() {
        let (client, transport) = client();
        drop(client);
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn test_send_ping_reaches_transport() {
        let (client, transport) = client();
        client.send_ping(b"hi".to_vec());
        assert_eq!(transport.pings(), vec![b"hi".to_vec()]);
    }
}
