//! Shared harness for client integration tests.
//!
//! Builds a [`BayeuxClient`] on a [`RecordingTransport`] and keeps the
//! transport's event sender so tests can play the server.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Arc;

use bayeux_client::{
    BayeuxClient, ChannelDelegate, ClientConfig, ClientEvent, RecordingTransport, Transport,
    TransportEvent,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub struct Harness {
    pub client: Arc<BayeuxClient>,
    pub transport: Arc<RecordingTransport>,
    pub server: UnboundedSender<TransportEvent>,
    pub events: UnboundedReceiver<ClientEvent>,
}

impl Harness {
    pub fn new() -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let (server, events_rx) = mpsc::unbounded_channel();
        let client = BayeuxClient::with_transport(
            ClientConfig::new("https://example.com/cometd"),
            Arc::clone(&transport) as Arc<dyn Transport>,
            events_rx,
            None,
        )
        .unwrap();
        let client = Arc::new(client);
        let (delegate, events) = ChannelDelegate::new();
        client.set_delegate(Arc::new(delegate));

        Self {
            client,
            transport,
            server,
            events,
        }
    }

    /// Handshake and answer it successfully with clientId `c1`.
    pub async fn connected() -> Self {
        let mut harness = Self::new();
        harness.client.handshake(serde_json::json!({"token": "t"}));
        harness.transport.set_connected(true);
        harness.send(TransportEvent::Connected);
        harness.reply(r#"[{"channel":"/meta/handshake","successful":true,"clientId":"c1"}]"#);
        harness.settle().await;
        harness
    }

    pub fn send(&self, event: TransportEvent) {
        self.server.send(event).unwrap();
    }

    /// Deliver one inbound frame.
    pub fn reply(&self, text: &str) {
        self.send(TransportEvent::Message(text.to_string()));
    }

    /// Wait until every event sent so far has been handled and return the
    /// client events they produced.
    pub async fn settle(&mut self) -> Vec<ClientEvent> {
        self.send(TransportEvent::Pong);
        let mut seen = Vec::new();
        while let Some(event) = self.events.recv().await {
            if event == ClientEvent::Pong {
                return seen;
            }
            seen.push(event);
        }
        seen
    }
}
