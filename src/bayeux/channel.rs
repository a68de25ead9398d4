//! Reserved channel names.

use std::fmt;

/// Connection types advertised in the handshake, in preference order.
pub const SUPPORTED_CONNECTION_TYPES: [&str; 4] =
    ["long-polling", "callback-polling", "iframe", "websocket"];

/// Connection type sent with every `/meta/connect`.
pub const WEBSOCKET_CONNECTION_TYPE: &str = "websocket";

/// Protocol-reserved `/meta/*` channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaChannel {
    /// `/meta/handshake`
    Handshake,
    /// `/meta/connect`
    Connect,
    /// `/meta/disconnect`
    Disconnect,
    /// `/meta/subscribe`
    Subscribe,
    /// `/meta/unsubscribe`
    Unsubscribe,
}

impl MetaChannel {
    /// Wire name of the channel.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "/meta/handshake",
            Self::Connect => "/meta/connect",
            Self::Disconnect => "/meta/disconnect",
            Self::Subscribe => "/meta/subscribe",
            Self::Unsubscribe => "/meta/unsubscribe",
        }
    }

    /// Classify a channel name. Returns `None` for application channels.
    #[must_use]
    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel {
            "/meta/handshake" => Some(Self::Handshake),
            "/meta/connect" => Some(Self::Connect),
            "/meta/disconnect" => Some(Self::Disconnect),
            "/meta/subscribe" => Some(Self::Subscribe),
            "/meta/unsubscribe" => Some(Self::Unsubscribe),
            _ => None,
        }
    }
}

impl fmt::Display for MetaChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channel_recognizes_meta_channels() {
        for meta in [
            MetaChannel::Handshake,
            MetaChannel::Connect,
            MetaChannel::Disconnect,
            MetaChannel::Subscribe,
            MetaChannel::Unsubscribe,
        ] {
            assert_eq!(MetaChannel::from_channel(meta.as_str()), Some(meta));
        }
    }

    #[test]
    fn test_from_channel_application_channel_is_none() {
        assert_eq!(MetaChannel::from_channel("/foo/bar"), None);
        assert_eq!(MetaChannel::from_channel("/meta/other"), None);
    }
}
