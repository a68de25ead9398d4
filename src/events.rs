//! Application-facing event surface.
//!
//! Everything the client learns asynchronously (replies, pushes, connection
//! changes, failures) reaches the application through a [`ClientDelegate`].
//! Every method has a no-op default, so implementors override only what
//! they care about. [`NoopDelegate`] is the delegate installed until the
//! application sets one.
//!
//! [`ChannelDelegate`] adapts the callback style into a stream of
//! [`ClientEvent`] values on a tokio channel, which is what async
//! applications and the integration tests consume.
//!
//! Strategic failures are additionally reported to an optional
//! [`Recorder`] for analytics.
//!
//! Delegate and recorder methods are always called with no client lock
//! held; they may call back into the client.

// Rust guideline compliant 2026-02

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{ClientError, HandshakeError, SubscriptionError, TransportError};

/// Receives client notifications. All methods default to doing nothing.
pub trait ClientDelegate: Send + Sync {
    /// A message arrived on an open application channel.
    fn on_message(&self, _channel: &str, _data: &Value) {}

    /// The server answered a ping.
    fn on_pong(&self) {}

    /// A connect reply asked to keep the connect cycle going.
    fn on_connected(&self) {}

    /// The handshake was accepted. Carries the reply's `ext`, if any.
    fn on_handshake_succeeded(&self, _ext: Option<&Value>) {}

    /// The handshake was rejected.
    fn on_handshake_failed(&self, _error: &HandshakeError) {}

    /// The session ended. `None` when the protocol ended it rather than the
    /// transport.
    fn on_disconnected(&self, _error: Option<&TransportError>) {}

    /// The server requires a new handshake.
    fn on_advised_to_rehandshake(&self) {}

    /// The connection was lost abnormally or could not be established.
    fn on_connection_failed(&self, _error: &TransportError) {}

    /// A subscribe was acknowledged.
    fn on_subscribed(&self, _channel: &str) {}

    /// An unsubscribe was acknowledged.
    fn on_unsubscribed(&self, _channel: &str) {}

    /// A subscribe was refused.
    fn on_subscription_failed(&self, _error: &SubscriptionError) {}

    /// A frame could not be written.
    fn on_write_error(&self, _error: &TransportError) {}
}

/// Delegate that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl ClientDelegate for NoopDelegate {}

/// Receives every strategic error for analytics or debugging.
pub trait Recorder: Send + Sync {
    /// Record `error`.
    fn record(&self, error: &ClientError);
}

/// Recorder that writes errors to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRecorder;

impl Recorder for LogRecorder {
    fn record(&self, error: &ClientError) {
        log::error!("[Bayeux] {} ({})", error, error.code());
    }
}

/// A client notification as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// See [`ClientDelegate::on_message`].
    Message {
        /// Channel the message arrived on.
        channel: String,
        /// The message `data`.
        data: Value,
    },
    /// See [`ClientDelegate::on_pong`].
    Pong,
    /// See [`ClientDelegate::on_connected`].
    Connected,
    /// See [`ClientDelegate::on_handshake_succeeded`].
    HandshakeSucceeded(Option<Value>),
    /// See [`ClientDelegate::on_handshake_failed`].
    HandshakeFailed(HandshakeError),
    /// See [`ClientDelegate::on_disconnected`].
    Disconnected(Option<TransportError>),
    /// See [`ClientDelegate::on_advised_to_rehandshake`].
    AdvisedToRehandshake,
    /// See [`ClientDelegate::on_connection_failed`].
    ConnectionFailed(TransportError),
    /// See [`ClientDelegate::on_subscribed`].
    Subscribed(String),
    /// See [`ClientDelegate::on_unsubscribed`].
    Unsubscribed(String),
    /// See [`ClientDelegate::on_subscription_failed`].
    SubscriptionFailed(SubscriptionError),
    /// See [`ClientDelegate::on_write_error`].
    WriteError(TransportError),
}

/// Delegate forwarding every notification as a [`ClientEvent`].
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelDelegate {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelDelegate {
    /// Create the delegate and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }
}

impl ClientDelegate for ChannelDelegate {
    fn on_message(&self, channel: &str, data: &Value) {
        self.send(ClientEvent::Message {
            channel: channel.to_string(),
            data: data.clone(),
        });
    }

    fn on_pong(&self) {
        self.send(ClientEvent::Pong);
    }

    fn on_connected(&self) {
        self.send(ClientEvent::Connected);
    }

    fn on_handshake_succeeded(&self, ext: Option<&Value>) {
        self.send(ClientEvent::HandshakeSucceeded(ext.cloned()));
    }

    fn on_handshake_failed(&self, error: &HandshakeError) {
        self.send(ClientEvent::HandshakeFailed(error.clone()));
    }

    fn on_disconnected(&self, error: Option<&TransportError>) {
        self.send(ClientEvent::Disconnected(error.cloned()));
    }

    fn on_advised_to_rehandshake(&self) {
        self.send(ClientEvent::AdvisedToRehandshake);
    }

    fn on_connection_failed(&self, error: &TransportError) {
        self.send(ClientEvent::ConnectionFailed(error.clone()));
    }

    fn on_subscribed(&self, channel: &str) {
        self.send(ClientEvent::Subscribed(channel.to_string()));
    }

    fn on_unsubscribed(&self, channel: &str) {
        self.send(ClientEvent::Unsubscribed(channel.to_string()));
    }

    fn on_subscription_failed(&self, error: &SubscriptionError) {
        self.send(ClientEvent::SubscriptionFailed(error.clone()));
    }

    fn on_write_error(&self, error: &TransportError) {
        self.send(ClientEvent::WriteError(error.clone()));
    }
}

/// Routes notifications to the current delegate and errors to the recorder.
pub struct Notifier {
    delegate: RwLock<Arc<dyn ClientDelegate>>,
    recorder: Option<Arc<dyn Recorder>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("has_recorder", &self.recorder.is_some())
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Notifier with a [`NoopDelegate`] and an optional recorder.
    #[must_use]
    pub fn new(recorder: Option<Arc<dyn Recorder>>) -> Self {
        Self {
            delegate: RwLock::new(Arc::new(NoopDelegate)),
            recorder,
        }
    }

    /// Replace the delegate.
    pub fn set_delegate(&self, delegate: Arc<dyn ClientDelegate>) {
        *self.delegate.write().expect("delegate lock poisoned") = delegate;
    }

    /// Call `f` on the current delegate, outside the delegate lock.
    pub fn emit(&self, f: impl FnOnce(&dyn ClientDelegate)) {
        let delegate = Arc::clone(&*self.delegate.read().expect("delegate lock poisoned"));
        f(delegate.as_ref());
    }

    /// Hand `error` to the recorder, if any.
    pub fn record(&self, error: impl Into<ClientError>) {
        if let Some(recorder) = &self.recorder {
            recorder.record(&error.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingRecorder {
        codes: Mutex<Vec<String>>,
    }

    impl Recorder for CollectingRecorder {
        fn record(&self, error: &ClientError) {
            self.codes.lock().unwrap().push(error.code().to_string());
        }
    }

    #[test]
    fn test_noop_delegate_accepts_everything() {
        let delegate = NoopDelegate;
        delegate.on_pong();
        delegate.on_message("/foo", &Value::Null);
        delegate.on_disconnected(None);
    }

    #[test]
    fn test_channel_delegate_forwards_events() {
        let (delegate, mut rx) = ChannelDelegate::new();
        delegate.on_subscribed("/foo");
        delegate.on_message("/foo", &serde_json::json!({"n": 1}));
        delegate.on_disconnected(Some(&TransportError::Cancelled));

        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Subscribed("/foo".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::Message {
                channel: "/foo".to_string(),
                data: serde_json::json!({"n": 1}),
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::Disconnected(Some(TransportError::Cancelled))
        );
    }

    #[test]
    fn test_channel_delegate_survives_dropped_receiver() {
        let (delegate, rx) = ChannelDelegate::new();
        drop(rx);
        delegate.on_pong();
    }

    #[test]
    fn test_notifier_switches_delegate() {
        let notifier = Notifier::new(None);
        notifier.emit(|d| d.on_pong());

        let (delegate, mut rx) = ChannelDelegate::new();
        notifier.set_delegate(Arc::new(delegate));
        notifier.emit(|d| d.on_connected());
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Connected);
    }

    #[test]
    fn test_notifier_records_errors() {
        let recorder = Arc::new(CollectingRecorder::default());
        let notifier = Notifier::new(Some(Arc::clone(&recorder) as Arc<dyn Recorder>));
        notifier.record(TransportError::NoLongerViable);
        notifier.record(HandshakeError::from_code(None, "nope"));

        assert_eq!(
            *recorder.codes.lock().unwrap(),
            vec!["ERROR_WS_NO_LONGER_VIABLE", "ERROR_COMETDCLIENT_HANDSHAKE"]
        );
    }
}
