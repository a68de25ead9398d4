//! Error types for the Bayeux client.
//!
//! Transport and server-side failures are never returned to callers of the
//! public operations; they travel through the [`ClientDelegate`] and the
//! optional [`Recorder`]. The only errors surfaced as `Result`s are local
//! precondition failures ([`ClientError::ClientIdNotValid`]) and
//! configuration errors.
//!
//! Every error exposes a stable string `code()` so recorders can aggregate
//! them without matching on display text.
//!
//! [`ClientDelegate`]: crate::events::ClientDelegate
//! [`Recorder`]: crate::events::Recorder

// Rust guideline compliant 2026-02

use thiserror::Error;

use crate::constants::UNMATCHED_CREDENTIALS_CODE;

/// Failure reported by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection stopped being usable (socket error mid-session).
    #[error("connection is no longer viable")]
    NoLongerViable,
    /// The connection ended without a close frame.
    #[error("connection cancelled")]
    Cancelled,
    /// The peer closed the connection.
    #[error("disconnected: {reason} (code {code})")]
    Disconnected {
        /// Close reason sent by the peer.
        reason: String,
        /// WebSocket close code (1005 when the peer sent none).
        code: u16,
    },
    /// Writing to the socket failed.
    #[error("write failed: {0}")]
    Write(String),
    /// Dialing the server failed.
    #[error("connect failed: {0}")]
    Connect(String),
}

impl TransportError {
    /// Stable error code for recorders.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoLongerViable => "ERROR_WS_NO_LONGER_VIABLE",
            Self::Cancelled => "ERROR_WS_CANCELED",
            Self::Disconnected { .. } => "ERROR_WS_DISCONNECTED",
            Self::Write(_) => "ERROR_WS_WRITE",
            Self::Connect(_) => "ERROR_WS_CONNECT",
        }
    }
}

/// A subscribe request the server refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscription to {channel} failed: {reason}")]
pub struct SubscriptionError {
    /// Channel the subscription was requested for.
    pub channel: String,
    /// Server-provided error text.
    pub reason: String,
}

impl SubscriptionError {
    /// Stable error code for recorders.
    #[must_use]
    pub fn code(&self) -> &'static str {
        "ERROR_COMETDCLIENT_SUBSCRIPTION"
    }
}

/// Why a handshake was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The server did not accept the supplied credentials.
    #[error("handshake rejected: credentials do not match ({message})")]
    UnmatchedCredentials {
        /// Server-provided message, empty when none was sent.
        message: String,
    },
    /// Any other handshake failure.
    #[error("handshake failed: {message}")]
    Unspecified {
        /// Server-provided error code, if any.
        code: Option<String>,
        /// Server-provided message, empty when none was sent.
        message: String,
    },
}

impl HandshakeError {
    /// Classify a server error code into a handshake failure reason.
    #[must_use]
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some(UNMATCHED_CREDENTIALS_CODE) => Self::UnmatchedCredentials { message },
            other => Self::Unspecified {
                code: other.map(str::to_string),
                message,
            },
        }
    }

    /// Stable error code for recorders.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::UnmatchedCredentials { .. } => UNMATCHED_CREDENTIALS_CODE,
            Self::Unspecified { code: Some(code), .. } => code,
            Self::Unspecified { code: None, .. } => "ERROR_COMETDCLIENT_HANDSHAKE",
        }
    }

    /// Numeric status in the style of an HTTP status (403 for rejected credentials).
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::UnmatchedCredentials { .. } => 403,
            Self::Unspecified { .. } => 11_001,
        }
    }
}

/// Configuration-time failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The server URL could not be parsed.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl {
        /// URL as supplied.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// The server URL has no host component.
    #[error("server URL '{url}' has no host")]
    MissingHost {
        /// URL as supplied.
        url: String,
    },
    /// The client was built outside a tokio runtime.
    #[error("bayeux client must be created inside a tokio runtime")]
    NoRuntime,
}

/// Top-level error type of the crate.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A clientId-bearing operation was attempted before a handshake completed.
    #[error("client id is not valid (handshake not completed)")]
    ClientIdNotValid,
    /// An outbound frame could not be encoded.
    #[error("failed to encode bayeux message: {0}")]
    Encode(#[from] serde_json::Error),
    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Rejected subscription.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    /// Rejected handshake.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Stable error code for recorders.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::ClientIdNotValid => "ERROR_COMETDCLIENT_CLIENT_ID_NOT_VALID",
            Self::Encode(_) => "ERROR_COMETDCLIENT_ENCODE",
            Self::Transport(e) => e.code(),
            Self::Subscription(e) => e.code(),
            Self::Handshake(e) => e.code(),
            Self::Config(_) => "ERROR_COMETDCLIENT_CONFIG",
        }
    }
}

/// Result alias for fallible client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_error_known_code_maps_to_unmatched_credentials() {
        let err = HandshakeError::from_code(Some("SIMPLE_UNMATCHED_LOGIN_PASSWORD"), "bad login");
        assert_eq!(
            err,
            HandshakeError::UnmatchedCredentials {
                message: "bad login".to_string()
            }
        );
        assert_eq!(err.status(), 403);
        assert_eq!(err.code(), "SIMPLE_UNMATCHED_LOGIN_PASSWORD");
    }

    #[test]
    fn test_handshake_error_other_code_is_unspecified() {
        let err = HandshakeError::from_code(Some("403::Handshake denied"), "");
        assert!(matches!(err, HandshakeError::Unspecified { .. }));
        assert_eq!(err.code(), "403::Handshake denied");
        assert_eq!(err.status(), 11_001);
    }

    #[test]
    fn test_handshake_error_without_code_uses_default() {
        let err = HandshakeError::from_code(None, "");
        assert_eq!(err.code(), "ERROR_COMETDCLIENT_HANDSHAKE");
    }

    #[test]
    fn test_client_error_code_delegates_to_inner() {
        let err = ClientError::from(TransportError::Cancelled);
        assert_eq!(err.code(), "ERROR_WS_CANCELED");

        let err = ClientError::from(SubscriptionError {
            channel: "/foo".to_string(),
            reason: "denied".to_string(),
        });
        assert_eq!(err.code(), "ERROR_COMETDCLIENT_SUBSCRIPTION");
        assert_eq!(err.to_string(), "subscription to /foo failed: denied");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Disconnected {
            reason: "bye".to_string(),
            code: 1000,
        };
        assert_eq!(err.to_string(), "disconnected: bye (code 1000)");
        assert_eq!(err.code(), "ERROR_WS_DISCONNECTED");
    }
}
