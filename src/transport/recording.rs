//! In-memory transport that records what the protocol layers write.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use super::Transport;

/// [`Transport`] that never touches the network.
///
/// Every frame passed to [`Transport::write_string`] is kept in order.
/// Connection state is whatever the owner last set with
/// [`set_connected`](Self::set_connected); events are injected by whoever
/// holds the event sender.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<String>>,
    pings: Mutex<Vec<Vec<u8>>>,
    connected: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl RecordingTransport {
    /// Create a disconnected transport with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what [`Transport::is_connected`] reports.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Raw frames written so far.
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().expect("frames lock poisoned").clone()
    }

    /// Every message written so far, flattened out of their batches.
    /// Frames that are not JSON arrays are skipped.
    #[must_use]
    pub fn messages(&self) -> Vec<Value> {
        self.frames()
            .iter()
            .filter_map(|frame| serde_json::from_str::<Vec<Value>>(frame).ok())
            .flatten()
            .collect()
    }

    /// Messages written so far on `channel`.
    #[must_use]
    pub fn messages_on(&self, channel: &str) -> Vec<Value> {
        self.messages()
            .into_iter()
            .filter(|m| m.get("channel").and_then(Value::as_str) == Some(channel))
            .collect()
    }

    /// Forget every recorded frame.
    pub fn clear(&self) {
        self.frames.lock().expect("frames lock poisoned").clear();
    }

    /// Ping payloads sent so far.
    #[must_use]
    pub fn pings(&self) -> Vec<Vec<u8>> {
        self.pings.lock().expect("pings lock poisoned").clone()
    }

    /// How many times `open_connection` was called.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// How many times `close_connection` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn write_string(&self, text: String) {
        self.frames.lock().expect("frames lock poisoned").push(text);
    }

    fn open_connection(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
    }

    fn close_connection(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn send_ping(&self, data: Vec<u8>) {
        self.pings.lock().expect("pings lock poisoned").push(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_frames_in_order() {
        let transport = RecordingTransport::new();
        transport.write_string(r#"[{"channel":"/a"}]"#.to_string());
        transport.write_string(r#"[{"channel":"/b"},{"channel":"/a"}]"#.to_string());
        transport.write_string("not json".to_string());

        assert_eq!(transport.frames().len(), 3);
        assert_eq!(transport.messages().len(), 3);
        assert_eq!(transport.messages_on("/a").len(), 2);

        transport.clear();
        assert!(transport.frames().is_empty());
    }

    #[test]
    fn test_close_drops_connected_flag() {
        let transport = RecordingTransport::new();
        transport.set_connected(true);
        transport.open_connection();
        transport.close_connection();

        assert!(!transport.is_connected());
        assert_eq!(transport.open_count(), 1);
        assert_eq!(transport.close_count(), 1);
    }
}
