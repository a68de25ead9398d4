//! Transport contract.
//!
//! A transport is a duplex text-message channel to the Bayeux server. The
//! protocol layers above it only ever call the synchronous [`Transport`]
//! methods; everything the transport observes comes back as a
//! [`TransportEvent`] on a tokio unbounded channel handed over at
//! construction time.
//!
//! # Architecture
//!
//! ```text
//!   BayeuxEngine ──write_string/send_ping──► Transport ──► socket
//!                                                │
//!   TransportAdapter ◄──── TransportEvent ───────┘
//!   (single consumer, arrival order)
//! ```
//!
//! Implementations:
//!
//! - [`WebSocketTransport`]: the real thing, over `tokio-tungstenite`
//! - [`RecordingTransport`]: in-memory; records every frame written to it

pub mod recording;
pub mod websocket;
pub mod ws;

pub use recording::RecordingTransport;
pub use websocket::WebSocketTransport;

use std::fmt;

use crate::error::TransportError;

/// Sender half of the transport event channel.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<TransportEvent>;

/// Receiver half of the transport event channel.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<TransportEvent>;

/// Something observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is up.
    Connected,
    /// The peer closed the connection.
    Disconnected(TransportError),
    /// The connection was lost abnormally, or could not be established.
    LostConnection(TransportError),
    /// A write failed. The connection may still be usable.
    WriteError(TransportError),
    /// A text frame arrived.
    Message(String),
    /// A pong arrived.
    Pong,
}

/// Duplex text-message channel.
///
/// All methods return immediately; outcomes are reported as
/// [`TransportEvent`]s. Implementations must deliver writes in call order.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// Queue a text frame.
    fn write_string(&self, text: String);

    /// Start connecting. No-op if a connection is already up or in progress.
    fn open_connection(&self);

    /// Close the connection, if any.
    fn close_connection(&self);

    /// Queue a ping frame.
    fn send_ping(&self, data: Vec<u8>);
}
