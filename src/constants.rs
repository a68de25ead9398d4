//! Protocol and timing constants for the Bayeux client.
//!
//! Centralizes the magic numbers the protocol engine, subscription manager
//! and WebSocket transport share, grouped by domain.
//!
//! # Categories
//!
//! - **Protocol**: Bayeux version strings and handshake advice
//! - **Timing**: Background task intervals and default timeouts
//! - **Backoff**: Dial retry configuration defaults

use std::time::Duration;

// ============================================================================
// Protocol
// ============================================================================

/// Bayeux protocol version announced in the handshake.
pub const BAYEUX_VERSION: &str = "1.0";

/// Lowest Bayeux protocol version this client accepts.
pub const BAYEUX_MINIMUM_VERSION: &str = "1.0";

/// `advice.interval` sent with the handshake, in milliseconds.
pub const HANDSHAKE_ADVICE_INTERVAL_MS: u64 = 0;

/// `advice.timeout` sent with the handshake, in milliseconds.
pub const HANDSHAKE_ADVICE_TIMEOUT_MS: u64 = 6000;

/// Server error code signalling that the handshake credentials were rejected.
pub const UNMATCHED_CREDENTIALS_CODE: &str = "SIMPLE_UNMATCHED_LOGIN_PASSWORD";

// ============================================================================
// Timing
// ============================================================================

/// How often pending (unacknowledged) subscriptions are re-sent.
///
/// Covers subscribe acknowledgements lost between the server and the client
/// without waiting forever on them.
pub const PENDING_RECONCILE_INTERVAL: Duration = Duration::from_secs(45);

/// Default `advice.timeout` sent with every `/meta/connect`, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Backoff
// ============================================================================

/// Default amount the dial retry delay grows per failed attempt, in milliseconds.
pub const DEFAULT_BACKOFF_INCREMENT_MS: u64 = 1000;

/// Default ceiling for the dial retry delay, in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;

/// Upper bound of the random jitter added to each dial retry delay, in milliseconds.
pub const BACKOFF_JITTER_MS: u64 = 1000;
