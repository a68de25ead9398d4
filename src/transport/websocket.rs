//! WebSocket transport.
//!
//! Implements [`Transport`] over a single `tokio-tungstenite` connection
//! owned by a background session task. The public methods never touch the
//! socket: they push [`Command`]s onto an unbounded queue that the session
//! task drains in order, so frames are written one at a time and never
//! interleave.
//!
//! # Lifecycle
//!
//! ```text
//!   open_connection()
//!         │
//!         ▼
//!   dial ──fail──► LostConnection(Connect) ──► sleep(backoff) ──┐
//!    │  ▲                                                       │
//!    │  └───────────────────────────────────────────────────────┘
//!    │ ok
//!    ▼
//!   Connected ──► message loop ──► Disconnected | LostConnection ──► task exits
//! ```
//!
//! Dial retries use linear backoff: the delay grows by the configured
//! increment per failed attempt up to the configured maximum, plus up to one
//! second of random jitter. Once a connection has been established and then
//! lost, the task exits; reconnecting is the caller's decision.
//!
//! A locally requested [`close_connection`](Transport::close_connection)
//! does not produce an event.

// Rust guideline compliant 2026-02

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ws::{self, WsMessage, WsReader, WsWriter};
use super::{EventSender, Transport, TransportEvent};
use crate::config::ClientConfig;
use crate::constants::BACKOFF_JITTER_MS;
use crate::error::{ConfigError, TransportError};

/// Work for the session task.
#[derive(Debug)]
enum Command {
    Text(String),
    Ping(Vec<u8>),
    Close,
}

/// Linear dial backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Backoff {
    increment_ms: u64,
    max_ms: u64,
}

impl Backoff {
    /// Delay before retrying after `attempt` consecutive failures (1-based),
    /// without jitter.
    fn base_delay(self, attempt: u32) -> Duration {
        let ms = self
            .increment_ms
            .saturating_mul(u64::from(attempt))
            .min(self.max_ms);
        Duration::from_millis(ms)
    }

    fn delay(self, attempt: u32) -> Duration {
        self.base_delay(attempt) + Duration::from_millis(rand::random::<u64>() % BACKOFF_JITTER_MS)
    }
}

/// A running session task and its command queue.
#[derive(Debug)]
struct Session {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// [`Transport`] over a WebSocket.
#[derive(Debug)]
pub struct WebSocketTransport {
    endpoint: String,
    backoff: Backoff,
    events: EventSender,
    runtime: tokio::runtime::Handle,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<Session>>,
}

impl WebSocketTransport {
    /// Create a transport for `config`'s endpoint. Nothing is dialed until
    /// [`Transport::open_connection`] is called.
    ///
    /// Must be called from within a tokio runtime; the session task is
    /// spawned onto it.
    pub fn new(config: &ClientConfig, events: EventSender) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        Ok(Self {
            endpoint,
            backoff: Backoff {
                increment_ms: config.backoff_increment_ms,
                max_ms: config.max_backoff_ms,
            },
            events,
            runtime,
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
        })
    }

    /// The `ws://` or `wss://` URL this transport dials.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send_command(&self, command: Command) {
        let session = self.session.lock().expect("session lock poisoned");
        let sent = session
            .as_ref()
            .is_some_and(|s| s.commands.send(command).is_ok());
        if !sent {
            log::warn!("[WebSocket] Dropping write, no session");
            let _ = self.events.send(TransportEvent::WriteError(TransportError::Write(
                "not connected".to_string(),
            )));
        }
    }
}

impl Transport for WebSocketTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn write_string(&self, text: String) {
        log::trace!("[WebSocket] >> {}", text);
        self.send_command(Command::Text(text));
    }

    fn open_connection(&self) {
        let mut session = self.session.lock().expect("session lock poisoned");
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            log::debug!("[WebSocket] Session already running");
            return;
        }

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(run_session(
            self.endpoint.clone(),
            self.backoff,
            self.events.clone(),
            Arc::clone(&self.connected),
            commands_rx,
        ));
        *session = Some(Session { commands, task });
    }

    fn close_connection(&self) {
        let session = self.session.lock().expect("session lock poisoned").take();
        if let Some(session) = session {
            log::debug!("[WebSocket] Closing connection");
            if session.commands.send(Command::Close).is_err() {
                session.task.abort();
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    fn send_ping(&self, data: Vec<u8>) {
        self.send_command(Command::Ping(data));
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.lock() {
            if let Some(session) = session.take() {
                session.task.abort();
            }
        }
    }
}

/// How the message loop ended.
enum SessionExit {
    /// Close was requested locally.
    Closed,
    /// The connection ended; the event has been emitted.
    Ended,
}

/// Dial with backoff, then run the message loop for one connection.
async fn run_session(
    endpoint: String,
    backoff: Backoff,
    events: EventSender,
    connected: Arc<AtomicBool>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let Some((mut writer, mut reader)) = dial(&endpoint, backoff, &events, &mut commands).await
    else {
        return;
    };

    connected.store(true, Ordering::SeqCst);
    let _ = events.send(TransportEvent::Connected);

    let exit = run_message_loop(&mut writer, &mut reader, &events, &mut commands).await;
    connected.store(false, Ordering::SeqCst);

    if let SessionExit::Closed = exit {
        if let Err(e) = writer.close().await {
            log::debug!("[WebSocket] Close failed: {}", e);
        }
        log::info!("[WebSocket] Connection closed");
    }
}

/// Dial until connected. Returns `None` if close was requested first.
async fn dial(
    endpoint: &str,
    backoff: Backoff,
    events: &EventSender,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Option<(WsWriter, WsReader)> {
    let mut attempt: u32 = 0;

    loop {
        log::info!("[WebSocket] Connecting to {}", endpoint);

        let connecting = ws::connect(endpoint);
        tokio::pin!(connecting);
        let result = loop {
            tokio::select! {
                result = &mut connecting => break result,
                command = commands.recv() => {
                    if reject_while_dialing(command, events) {
                        return None;
                    }
                }
            }
        };

        match result {
            Ok(pair) => {
                log::info!("[WebSocket] Connected");
                return Some(pair);
            }
            Err(e) => {
                attempt = attempt.saturating_add(1);
                let delay = backoff.delay(attempt);
                log::warn!(
                    "[WebSocket] Connection failed: {:#} (retry in {}ms)",
                    e,
                    delay.as_millis()
                );
                let _ = events.send(TransportEvent::LostConnection(TransportError::Connect(
                    format!("{e:#}"),
                )));

                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        () = &mut sleep => break,
                        command = commands.recv() => {
                            if reject_while_dialing(command, events) {
                                return None;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Handle a command that arrived before the socket is up. Returns `true` if
/// the session should stop.
fn reject_while_dialing(command: Option<Command>, events: &EventSender) -> bool {
    match command {
        None | Some(Command::Close) => {
            log::debug!("[WebSocket] Close requested while dialing");
            true
        }
        Some(Command::Text(_) | Command::Ping(_)) => {
            log::warn!("[WebSocket] Dropping write, not connected yet");
            let _ = events.send(TransportEvent::WriteError(TransportError::Write(
                "not connected".to_string(),
            )));
            false
        }
    }
}

/// Pump commands out and frames in until the connection ends.
async fn run_message_loop(
    writer: &mut WsWriter,
    reader: &mut WsReader,
    events: &EventSender,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> SessionExit {
    loop {
        tokio::select! {
            msg = reader.recv() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        log::trace!("[WebSocket] << {}", text);
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = writer.send_pong(data).await;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        let _ = events.send(TransportEvent::Pong);
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        log::debug!("[WebSocket] Ignoring {}-byte binary frame", data.len());
                    }
                    Some(Ok(WsMessage::Close { code, reason })) => {
                        log::info!("[WebSocket] Closed by server ({} {})", code, reason);
                        let _ = events.send(TransportEvent::Disconnected(
                            TransportError::Disconnected { reason, code },
                        ));
                        return SessionExit::Ended;
                    }
                    Some(Err(e)) => {
                        log::warn!("[WebSocket] {}", e);
                        let _ = events.send(TransportEvent::LostConnection(
                            TransportError::NoLongerViable,
                        ));
                        return SessionExit::Ended;
                    }
                    None => {
                        log::info!("[WebSocket] Stream ended");
                        let _ = events.send(TransportEvent::LostConnection(
                            TransportError::Cancelled,
                        ));
                        return SessionExit::Ended;
                    }
                }
            }

            command = commands.recv() => {
                let result = match command {
                    Some(Command::Text(text)) => writer.send_text(text).await,
                    Some(Command::Ping(data)) => writer.send_ping(data).await,
                    Some(Command::Close) | None => return SessionExit::Closed,
                };
                if let Err(e) = result {
                    log::error!("[WebSocket] Write failed: {:#}", e);
                    let _ = events.send(TransportEvent::WriteError(TransportError::Write(
                        format!("{e:#}"),
                    )));
                    let _ = events.send(TransportEvent::LostConnection(
                        TransportError::NoLongerViable,
                    ));
                    return SessionExit::Ended;
                }
            }
        }
    }
}
