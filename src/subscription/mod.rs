//! Subscription lifecycle.
//!
//! Tracks every channel through three disjoint sets and reference-counts
//! interest in each channel by callback handle.
//!
//! # Lifecycle
//!
//! ```text
//!            not connected              sent                  acked
//!   request ──────────────► queued ──────────► pending ──────────────► open
//!      │                      ▲  flush_queued     │  ▲                  │
//!      │      connected       │  (handshake ok)   │  │ reconcile_pending│
//!      └──────────────────────┼──────────────────►│  └──(every 45 s)    │
//!                             │                   │                     │
//!                     stale clientId        subscribe failed      unsubscribed
//!                     (after one retry)         ▼                     ▼
//!                                             gone                  gone
//! ```
//!
//! A channel is unsubscribed only when its last [`Subscription`] handle is
//! released.
//!
//! Each set has its own lock and no operation holds two set locks at once.
//! Callbacks are handed out as cloned `Arc`s so they run outside every lock
//! here.

// Rust guideline compliant 2026-02

mod model;
pub mod reconcile;
mod set;

pub use model::{Callback, ChannelKind, Subscription, SubscriptionModel, SubscriptionState};
pub use reconcile::ReconcileTask;
pub use set::SubscriptionSet;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::engine::ProtocolEngine;
use crate::error::ClientError;

/// Subscription bookkeeping, as seen by the facade and the resolver.
pub trait Subscriber: Send + Sync {
    /// Register interest in `model`'s channel and decide its state.
    ///
    /// A handle is registered whether or not a callback is given.
    fn register_interest(
        &self,
        model: SubscriptionModel,
        callback: Option<Callback>,
    ) -> (SubscriptionState, Subscription);

    /// Send subscribe requests for `models`, or queue them when not connected.
    fn subscribe(&self, models: Vec<SubscriptionModel>);

    /// Send everything queued in one batch.
    fn flush_queued(&self);

    /// Re-send every pending subscribe in one batch, if connected. The
    /// models stay in `pending` until acknowledged.
    fn reconcile_pending(&self);

    /// Release one handle; unsubscribes once the channel has no handles left.
    fn release_handle(&self, handle: &Subscription);

    /// Release every handle and unsubscribe from every known channel.
    fn release_all_handles(&self);

    /// Whether the server acknowledged `channel`.
    fn is_open(&self, channel: &str) -> bool;

    /// Subscribe acknowledged: pending → open.
    fn on_subscribed(&self, channel: &str);

    /// Subscribe refused: drop from pending.
    fn on_subscribe_failed(&self, channel: &str);

    /// Unsubscribe acknowledged: drop from open.
    fn on_unsubscribed(&self, channel: &str);

    /// Snapshot of the callbacks registered for `channel`.
    fn callbacks(&self, channel: &str) -> Vec<Callback>;
}

/// Handles registered for one channel.
#[derive(Debug, Default)]
struct ChannelCallbacks {
    handles: Vec<Subscription>,
    next_index: usize,
}

/// [`Subscriber`] sending through a [`ProtocolEngine`].
pub struct SubscriptionManager {
    engine: Arc<dyn ProtocolEngine>,
    sequence: AtomicU64,
    queued: SubscriptionSet,
    pending: SubscriptionSet,
    open: SubscriptionSet,
    callbacks: RwLock<HashMap<String, ChannelCallbacks>>,
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("queued", &self.queued.channels())
            .field("pending", &self.pending.channels())
            .field("open", &self.open.channels())
            .finish_non_exhaustive()
    }
}

impl SubscriptionManager {
    /// Create a manager sending through `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn ProtocolEngine>) -> Self {
        Self {
            engine,
            sequence: AtomicU64::new(0),
            queued: SubscriptionSet::new(),
            pending: SubscriptionSet::new(),
            open: SubscriptionSet::new(),
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    /// New subscribe request for `channel`, stamped with the next sequence id
    /// and the current client id.
    #[must_use]
    pub fn new_model(&self, channel: &str) -> SubscriptionModel {
        SubscriptionModel {
            subscription_url: channel.to_string(),
            channel_kind: ChannelKind::Subscribe,
            client_id: self.engine.client_id(),
            sequence_id: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Channels waiting for a connection.
    #[must_use]
    pub fn queued_channels(&self) -> Vec<String> {
        self.queued.channels()
    }

    /// Channels sent but not yet acknowledged.
    #[must_use]
    pub fn pending_channels(&self) -> Vec<String> {
        self.pending.channels()
    }

    /// Channels acknowledged by the server.
    #[must_use]
    pub fn open_channels(&self) -> Vec<String> {
        self.open.channels()
    }

    /// Number of live handles on `channel`.
    #[must_use]
    pub fn handle_count(&self, channel: &str) -> usize {
        self.callbacks
            .read()
            .expect("callbacks lock poisoned")
            .get(channel)
            .map_or(0, |c| c.handles.len())
    }

    fn register_handle(&self, channel: &str, callback: Option<Callback>) -> Subscription {
        let mut callbacks = self.callbacks.write().expect("callbacks lock poisoned");
        let entry = callbacks.entry(channel.to_string()).or_default();
        let handle = Subscription::new(channel.to_string(), entry.next_index, callback);
        entry.next_index += 1;
        entry.handles.push(handle.clone());
        handle
    }

    /// Send `models` and track them as pending.
    ///
    /// Models enter `pending` before the frame is written so an
    /// acknowledgement can never overtake the bookkeeping.
    fn send_subscribe(&self, models: Vec<SubscriptionModel>) {
        if models.is_empty() {
            return;
        }
        self.pending.extend(models.iter().cloned());
        self.write_subscribe(models);
    }

    /// Write a subscribe batch for models already in `pending`.
    ///
    /// If the engine has no client id yet but one appears before the retry,
    /// the models are stamped with it and sent once more; if that also fails
    /// they move from `pending` to `queued` for the next handshake.
    fn write_subscribe(&self, mut models: Vec<SubscriptionModel>) {
        let mut result = self.engine.subscribe(&models);
        if matches!(result, Err(ClientError::ClientIdNotValid)) {
            if let Some(client_id) = self.engine.client_id() {
                log::debug!("[Subscriptions] Retrying subscribe with refreshed client id");
                for model in &mut models {
                    model.client_id = Some(client_id.clone());
                }
                result = self.engine.subscribe(&models);
            }
        }

        match result {
            Ok(()) => {
                log::debug!(
                    "[Subscriptions] Subscribing to {}",
                    models
                        .iter()
                        .map(|m| m.subscription_url.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            Err(ClientError::ClientIdNotValid) => {
                log::info!(
                    "[Subscriptions] No client id, queueing {} subscription(s)",
                    models.len()
                );
                for model in &models {
                    self.pending.remove(&model.subscription_url);
                }
                self.queued.extend(models);
            }
            Err(e) => {
                log::error!("[Subscriptions] Subscribe failed: {}", e);
                for model in &models {
                    self.pending.remove(&model.subscription_url);
                }
            }
        }
    }

    /// Forget `channel` in every set and tell the server.
    fn clear_channel(&self, channel: &str) {
        self.engine.unsubscribe(channel);
        self.queued.remove(channel);
        self.pending.remove(channel);
        self.open.remove(channel);
    }
}

impl Subscriber for SubscriptionManager {
    fn register_interest(
        &self,
        model: SubscriptionModel,
        callback: Option<Callback>,
    ) -> (SubscriptionState, Subscription) {
        let handle = self.register_handle(&model.subscription_url, callback);

        let state = if self.open.contains(&model.subscription_url) {
            SubscriptionState::Subscribed(model)
        } else if self.pending.contains(&model.subscription_url) {
            SubscriptionState::Pending(model)
        } else if !self.engine.is_connected() {
            log::debug!(
                "[Subscriptions] Not connected, queueing {}",
                model.subscription_url
            );
            self.queued.insert(model.clone());
            SubscriptionState::Queued(model)
        } else {
            self.send_subscribe(vec![model.clone()]);
            SubscriptionState::SubscribingTo(model)
        };

        (state, handle)
    }

    fn subscribe(&self, models: Vec<SubscriptionModel>) {
        if self.engine.is_connected() {
            self.send_subscribe(models);
        } else {
            self.queued.extend(models);
        }
    }

    fn flush_queued(&self) {
        let models = self.queued.drain();
        if models.is_empty() {
            return;
        }
        log::info!(
            "[Subscriptions] Sending {} queued subscription(s)",
            models.len()
        );
        self.send_subscribe(models);
    }

    fn reconcile_pending(&self) {
        if !self.engine.is_connected() || self.pending.is_empty() {
            return;
        }
        // Not drained: an ack arriving mid-write must leave the model open.
        let models = self.pending.snapshot();
        if models.is_empty() {
            return;
        }
        log::warn!(
            "[Subscriptions] Re-sending {} unacknowledged subscription(s)",
            models.len()
        );
        self.write_subscribe(models);
    }

    fn release_handle(&self, handle: &Subscription) {
        let channel_empty = {
            let mut callbacks = self.callbacks.write().expect("callbacks lock poisoned");
            let Some(entry) = callbacks.get_mut(handle.channel()) else {
                log::debug!(
                    "[Subscriptions] Release of unknown handle on {}",
                    handle.channel()
                );
                return;
            };
            let Some(position) = entry.handles.iter().position(|h| h == handle) else {
                log::debug!(
                    "[Subscriptions] Handle {} on {} already released",
                    handle.index(),
                    handle.channel()
                );
                return;
            };
            entry.handles.remove(position);
            if entry.handles.is_empty() {
                callbacks.remove(handle.channel());
                true
            } else {
                false
            }
        };

        if channel_empty {
            log::debug!(
                "[Subscriptions] Last handle released, unsubscribing from {}",
                handle.channel()
            );
            self.clear_channel(handle.channel());
        }
    }

    fn release_all_handles(&self) {
        let registered: Vec<String> = {
            let mut callbacks = self.callbacks.write().expect("callbacks lock poisoned");
            callbacks.drain().map(|(channel, _)| channel).collect()
        };

        let mut channels = self.queued.channels();
        for channel in self
            .pending
            .channels()
            .into_iter()
            .chain(self.open.channels())
            .chain(registered)
        {
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }

        for channel in &channels {
            self.clear_channel(channel);
        }
    }

    fn is_open(&self, channel: &str) -> bool {
        self.open.contains(channel)
    }

    fn on_subscribed(&self, channel: &str) {
        let model = match self.pending.remove(channel) {
            Some(model) => model,
            None if self.handle_count(channel) > 0 => self.new_model(channel),
            None => {
                log::debug!(
                    "[Subscriptions] Ignoring ack for released channel {}",
                    channel
                );
                return;
            }
        };
        self.open.insert(model);
    }

    fn on_subscribe_failed(&self, channel: &str) {
        self.pending.remove(channel);
    }

    fn on_unsubscribed(&self, channel: &str) {
        self.open.remove(channel);
    }

    fn callbacks(&self, channel: &str) -> Vec<Callback> {
        self.callbacks
            .read()
            .expect("callbacks lock poisoned")
            .get(channel)
            .map(|entry| {
                entry
                    .handles
                    .iter()
                    .filter_map(|h| h.callback().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
