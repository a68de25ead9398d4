//! Ordered, channel-deduplicated set of subscription models.

use std::sync::RwLock;

use super::model::SubscriptionModel;

/// One of the queued/pending/open sets.
///
/// Each set has its own lock; no method takes more than that one lock.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    models: RwLock<Vec<SubscriptionModel>>,
}

impl SubscriptionSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `model` unless its channel is already present. Returns whether it
    /// was added.
    pub fn insert(&self, model: SubscriptionModel) -> bool {
        let mut models = self.models.write().expect("subscription set lock poisoned");
        if models.contains(&model) {
            return false;
        }
        models.push(model);
        true
    }

    /// Add every model whose channel is not already present.
    pub fn extend(&self, new_models: impl IntoIterator<Item = SubscriptionModel>) {
        let mut models = self.models.write().expect("subscription set lock poisoned");
        for model in new_models {
            if !models.contains(&model) {
                models.push(model);
            }
        }
    }

    /// Remove the model for `channel`.
    pub fn remove(&self, channel: &str) -> Option<SubscriptionModel> {
        let mut models = self.models.write().expect("subscription set lock poisoned");
        let position = models.iter().position(|m| m.subscription_url == channel)?;
        Some(models.remove(position))
    }

    /// Whether `channel` is present.
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.models
            .read()
            .expect("subscription set lock poisoned")
            .iter()
            .any(|m| m.subscription_url == channel)
    }

    /// Take every model out, in insertion order.
    pub fn drain(&self) -> Vec<SubscriptionModel> {
        std::mem::take(&mut *self.models.write().expect("subscription set lock poisoned"))
    }

    /// Copy of every model, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriptionModel> {
        self.models
            .read()
            .expect("subscription set lock poisoned")
            .clone()
    }

    /// Channel names, in insertion order.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.models
            .read()
            .expect("subscription set lock poisoned")
            .iter()
            .map(|m| m.subscription_url.clone())
            .collect()
    }

    /// Number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.read().expect("subscription set lock poisoned").len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::ChannelKind;

    fn model(url: &str, sequence_id: u64) -> SubscriptionModel {
        SubscriptionModel {
            subscription_url: url.to_string(),
            channel_kind: ChannelKind::Subscribe,
            client_id: None,
            sequence_id,
        }
    }

    #[test]
    fn test_insert_dedupes_by_channel() {
        let set = SubscriptionSet::new();
        assert!(set.insert(model("/foo", 1)));
        assert!(!set.insert(model("/foo", 2)));
        assert!(set.insert(model("/bar", 3)));
        assert_eq!(set.channels(), vec!["/foo", "/bar"]);
    }

    #[test]
    fn test_remove_and_contains() {
        let set = SubscriptionSet::new();
        set.extend([model("/foo", 1), model("/bar", 2), model("/foo", 3)]);
        assert_eq!(set.len(), 2);

        let removed = set.remove("/foo").unwrap();
        assert_eq!(removed.sequence_id, 1);
        assert!(!set.contains("/foo"));
        assert!(set.contains("/bar"));
        assert!(set.remove("/foo").is_none());
    }

    #[test]
    fn test_snapshot_leaves_set_intact() {
        let set = SubscriptionSet::new();
        set.extend([model("/a", 1), model("/b", 2)]);

        let copy = set.snapshot();
        assert_eq!(copy.len(), 2);
        assert_eq!(copy[1].sequence_id, 2);
        assert_eq!(set.channels(), vec!["/a", "/b"]);
    }

    #[test]
    fn test_drain_empties_set() {
        let set = SubscriptionSet::new();
        set.extend([model("/a", 1), model("/b", 2)]);

        let drained = set.drain();
        assert_eq!(drained.len(), 2);
        assert!(set.is_empty());
    }
}
