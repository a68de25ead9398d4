//! Bayeux client - CometD-style publish/subscribe over one WebSocket.
//!
//! This crate implements the client side of the Bayeux protocol: the
//! handshake/connect lifecycle, per-channel subscription bookkeeping,
//! inbound dispatch and reconnect-advice handling.
//!
//! # Architecture
//!
//! Components, leaf first:
//!
//! - **Transport** - duplex text channel; events arrive on an mpsc channel
//! - **Engine** - builds outbound frames, owns clientId and message ids
//! - **Subscriptions** - queued/pending/open sets and callback handles
//! - **Resolver** - inbound state machine and callback dispatch
//! - **Adapter** - single-consumer pipeline from transport events
//! - **Client** - the facade applications use
//!
//! # Modules
//!
//! - [`bayeux`] - wire message and channel names
//! - [`client`] - [`BayeuxClient`] facade
//! - [`config`] - [`ClientConfig`] loading
//! - [`events`] - delegate, event and recorder contracts
//! - [`transport`] - transport trait and implementations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bayeux_client::{BayeuxClient, ChannelDelegate, ClientConfig, ClientEvent};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = BayeuxClient::configure(ClientConfig::new("https://example.com/cometd"), None)?;
//! let (delegate, mut events) = ChannelDelegate::new();
//! client.set_delegate(Arc::new(delegate));
//!
//! client.subscribe_to_channel("/chat/room1", None);
//! client.handshake(serde_json::json!({"user": "alice", "token": "secret"}));
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::Message { channel, data } = event {
//!         println!("{channel}: {data}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod bayeux;
pub mod client;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod resolver;
pub mod subscription;
pub mod transport;

// Re-export commonly used types
pub use client::BayeuxClient;
pub use config::ClientConfig;
pub use engine::ConnectionState;
pub use error::{ClientError, ConfigError, HandshakeError, SubscriptionError, TransportError};
pub use events::{ChannelDelegate, ClientDelegate, ClientEvent, LogRecorder, NoopDelegate, Recorder};
pub use subscription::{Callback, Subscription, SubscriptionModel, SubscriptionState};
pub use transport::{RecordingTransport, Transport, TransportEvent};
