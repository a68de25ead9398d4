//! Bayeux wire protocol.
//!
//! Channel names and the message record exchanged with a Bayeux server.
//! Everything on the wire is a JSON array of [`Message`] objects; this
//! module owns encoding outbound batches and leniently decoding inbound
//! ones.
//!
//! # Message kinds
//!
//! ```text
//!   Outbound                                  Inbound replies
//!   ────────                                  ───────────────
//!   /meta/handshake   version, ext.auth  ───►  clientId, successful, ext
//!   /meta/connect     id, clientId       ───►  successful, advice.reconnect
//!   /meta/disconnect  id, clientId       ───►  successful
//!   /meta/subscribe   id, subscription   ───►  successful | error, subscription
//!   /meta/unsubscribe subscription       ───►  subscription
//!   /app/channel      id, data           ◄───  data (server push)
//! ```

pub mod channel;
pub mod message;

pub use channel::{MetaChannel, SUPPORTED_CONNECTION_TYPES, WEBSOCKET_CONNECTION_TYPE};
pub use message::{encode_batch, parse_batch, Advice, Message, MessageId, Reconnect};
