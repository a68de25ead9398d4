//! Inbound message dispatch.
//!
//! Decodes each inbound frame into its messages and routes every message by
//! channel: meta replies drive the connection state machine and the
//! subscription sets, application messages go to the registered callbacks.
//!
//! # State machine
//!
//! ```text
//!                  handshake ok                    connect ok + retry
//!   Disconnected ──────────────► Connected ◄──────────────────────────┐
//!        ▲  ▲                      │  │  └── connect() ───────────────┘
//!        │  │ handshake failed     │  │
//!        │  └──────────────────────┘  │ connect failed / disconnect reply /
//!        └────────────────────────────┘ connect ok without retry
//! ```
//!
//! `Handshaking` is entered by the engine when the handshake is written.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use crate::bayeux::{parse_batch, Message, MetaChannel, Reconnect};
use crate::engine::{ConnectionState, ProtocolEngine};
use crate::error::{HandshakeError, SubscriptionError};
use crate::events::Notifier;
use crate::subscription::Subscriber;

/// Consumes inbound frames.
pub trait Resolver: Send + Sync {
    /// Process one inbound text frame.
    fn resolve(&self, text: &str);
}

/// [`Resolver`] implementing the Bayeux client state machine.
#[derive(Clone)]
pub struct MessageResolver {
    engine: Arc<dyn ProtocolEngine>,
    subscriber: Arc<dyn Subscriber>,
    notifier: Arc<Notifier>,
}

impl std::fmt::Debug for MessageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageResolver")
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl MessageResolver {
    /// Create a resolver acting on `engine` and `subscriber` and reporting
    /// through `notifier`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn ProtocolEngine>,
        subscriber: Arc<dyn Subscriber>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            engine,
            subscriber,
            notifier,
        }
    }

    fn dispatch(&self, message: Message) {
        let Some(channel) = message.channel.clone() else {
            return;
        };

        match MetaChannel::from_channel(&channel) {
            Some(MetaChannel::Handshake) => self.on_handshake(&message),
            Some(MetaChannel::Connect) => self.on_connect(&message),
            Some(MetaChannel::Disconnect) => self.on_disconnect(),
            Some(MetaChannel::Subscribe) => self.on_subscribe(message),
            Some(MetaChannel::Unsubscribe) => self.on_unsubscribe(message),
            None => self.on_application_message(&channel, message),
        }
    }

    fn on_handshake(&self, message: &Message) {
        self.engine.set_client_id(message.client_id.clone());

        if message.is_successful() {
            log::info!(
                "[Resolver] Handshake accepted (clientId={})",
                message.client_id.as_deref().unwrap_or("")
            );
            self.notifier
                .emit(|d| d.on_handshake_succeeded(message.ext.as_ref()));
            self.engine.set_state(ConnectionState::Connected);
            self.engine.connect();
            self.subscriber.flush_queued();
        } else {
            let error = HandshakeError::from_code(
                message.error_code().as_deref(),
                message.error.clone().unwrap_or_default(),
            );
            log::error!("[Resolver] {}", error);
            self.notifier.emit(|d| d.on_handshake_failed(&error));
            self.notifier.record(error);
            self.end_session();
        }
    }

    fn on_connect(&self, message: &Message) {
        let advice = message.reconnect_advice();

        if message.is_successful() {
            if advice == Some(Reconnect::Retry) {
                self.engine.set_state(ConnectionState::Connected);
                self.notifier.emit(|d| d.on_connected());
                self.engine.connect();
            } else {
                log::debug!("[Resolver] Connect reply without retry advice ({:?})", advice);
                self.engine.set_state(ConnectionState::Disconnected);
            }
        } else {
            log::warn!(
                "[Resolver] Connect failed: {}",
                message.error.as_deref().unwrap_or("no error given")
            );
            self.end_session();
            if advice == Some(Reconnect::Handshake) {
                self.notifier.emit(|d| d.on_advised_to_rehandshake());
            }
        }
    }

    fn on_disconnect(&self) {
        log::info!("[Resolver] Disconnect acknowledged");
        self.end_session();
    }

    fn on_subscribe(&self, message: Message) {
        match (message.is_successful(), message.subscription, message.error) {
            (true, Some(channel), _) => {
                log::debug!("[Resolver] Subscribed to {}", channel);
                self.subscriber.on_subscribed(&channel);
                self.notifier.emit(|d| d.on_subscribed(&channel));
            }
            (false, Some(channel), Some(reason)) => {
                log::warn!("[Resolver] Subscribe to {} refused: {}", channel, reason);
                self.subscriber.on_subscribe_failed(&channel);
                let error = SubscriptionError { channel, reason };
                self.notifier.emit(|d| d.on_subscription_failed(&error));
                self.notifier.record(error);
            }
            _ => log::warn!("[Resolver] Dropping incomplete subscribe reply"),
        }
    }

    fn on_unsubscribe(&self, message: Message) {
        let Some(channel) = message.subscription else {
            log::warn!("[Resolver] Dropping unsubscribe reply without subscription");
            return;
        };
        log::debug!("[Resolver] Unsubscribed from {}", channel);
        self.subscriber.on_unsubscribed(&channel);
        self.notifier.emit(|d| d.on_unsubscribed(&channel));
    }

    fn on_application_message(&self, channel: &str, message: Message) {
        if !self.subscriber.is_open(channel) {
            log::warn!("[Resolver] Dropping message on unexpected channel {}", channel);
            return;
        }
        let Some(data) = message.data else {
            log::warn!("[Resolver] Dropping message without data on {}", channel);
            return;
        };

        for callback in self.subscriber.callbacks(channel) {
            callback(&data);
        }
        self.notifier.emit(|d| d.on_message(channel, &data));
    }

    /// Drop to `Disconnected`, close the transport, tell the delegate.
    fn end_session(&self) {
        self.engine.set_state(ConnectionState::Disconnected);
        self.engine.close_connection();
        self.notifier.emit(|d| d.on_disconnected(None));
    }
}

impl Resolver for MessageResolver {
    fn resolve(&self, text: &str) {
        log::trace!("[Resolver] << {}", text);
        for message in parse_batch(text) {
            self.dispatch(message);
        }
    }
}
