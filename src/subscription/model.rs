//! Subscription records and callback handles.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::bayeux::MetaChannel;

/// Callback invoked with the `data` payload of every message on a channel.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Kind of request a [`SubscriptionModel`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    /// `/meta/subscribe`.
    #[default]
    Subscribe,
}

impl ChannelKind {
    /// Meta channel the request is sent on.
    #[must_use]
    pub fn meta_channel(self) -> MetaChannel {
        match self {
            Self::Subscribe => MetaChannel::Subscribe,
        }
    }
}

/// A subscribe request for one channel.
///
/// Two models are equal when they name the same channel, regardless of
/// sequence id or client id.
#[derive(Debug, Clone)]
pub struct SubscriptionModel {
    /// Channel to subscribe to, e.g. `/chat/room1` or `/foo/**`.
    pub subscription_url: String,
    /// Request kind.
    pub channel_kind: ChannelKind,
    /// Client id at creation time.
    pub client_id: Option<String>,
    /// Sent as the subscribe message `id`.
    pub sequence_id: u64,
}

impl PartialEq for SubscriptionModel {
    fn eq(&self, other: &Self) -> bool {
        self.subscription_url == other.subscription_url
    }
}

impl Eq for SubscriptionModel {}

/// Handle to one registered interest in a channel.
///
/// Returned by every subscribe-to-channel call and used to release that
/// interest. The channel is unsubscribed once its last handle is released.
#[derive(Clone)]
pub struct Subscription {
    channel: String,
    index: usize,
    callback: Option<Callback>,
}

impl Subscription {
    pub(crate) fn new(channel: String, index: usize, callback: Option<Callback>) -> Self {
        Self {
            channel,
            index,
            callback,
        }
    }

    /// Channel this handle belongs to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Registration index, unique per channel.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.channel == other.channel && self.index == other.index
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("index", &self.index)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Outcome of registering interest in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Sent earlier and still unacknowledged.
    Pending(SubscriptionModel),
    /// Already acknowledged by the server.
    Subscribed(SubscriptionModel),
    /// Not connected; will be sent after the next successful handshake.
    Queued(SubscriptionModel),
    /// A subscribe request was just sent.
    SubscribingTo(SubscriptionModel),
}

impl SubscriptionState {
    /// The model the state refers to.
    #[must_use]
    pub fn model(&self) -> &SubscriptionModel {
        match self {
            Self::Pending(model)
            | Self::Subscribed(model)
            | Self::Queued(model)
            | Self::SubscribingTo(model) => model,
        }
    }
}
