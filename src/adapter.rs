//! Transport event pipeline.
//!
//! [`TransportAdapter`] turns [`TransportEvent`]s into engine and resolver
//! calls. [`TransportAdapter::run`] is the single consumer of the transport's
//! event channel: events are handled one at a time in arrival order, and
//! each handler finishes (including any frames it writes) before the next
//! event is looked at.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use crate::engine::{ConnectionState, ProtocolEngine};
use crate::events::Notifier;
use crate::resolver::Resolver;
use crate::transport::{EventReceiver, TransportEvent};

/// Bridges transport events to the protocol layers.
#[derive(Clone)]
pub struct TransportAdapter {
    engine: Arc<dyn ProtocolEngine>,
    resolver: Arc<dyn Resolver>,
    notifier: Arc<Notifier>,
}

impl std::fmt::Debug for TransportAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportAdapter").finish_non_exhaustive()
    }
}

impl TransportAdapter {
    /// Create an adapter driving `engine` and `resolver`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn ProtocolEngine>,
        resolver: Arc<dyn Resolver>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            engine,
            resolver,
            notifier,
        }
    }

    /// Handle one event.
    pub fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                log::info!("[Bayeux] Transport connected, starting handshake");
                self.engine.set_connection_initiated(false);
                self.engine.start_handshake(self.engine.handshake_fields());
            }
            TransportEvent::Disconnected(error) => {
                log::info!("[Bayeux] Transport disconnected: {}", error);
                self.engine.set_connection_initiated(false);
                self.engine.set_state(ConnectionState::Disconnected);
                self.notifier.emit(|d| d.on_disconnected(Some(&error)));
            }
            TransportEvent::LostConnection(error) => {
                log::warn!("[Bayeux] Transport lost connection: {}", error);
                self.engine.set_connection_initiated(false);
                self.engine.set_state(ConnectionState::Disconnected);
                self.notifier.emit(|d| d.on_connection_failed(&error));
                self.notifier.record(error);
            }
            TransportEvent::WriteError(error) => {
                log::error!("[Bayeux] {}", error);
                self.notifier.emit(|d| d.on_write_error(&error));
                self.notifier.record(error);
            }
            TransportEvent::Message(text) => self.resolver.resolve(&text),
            TransportEvent::Pong => self.notifier.emit(|d| d.on_pong()),
        }
    }

    /// Consume `events` until every sender is gone.
    pub async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        log::debug!("[Bayeux] Transport event channel closed");
    }
}
