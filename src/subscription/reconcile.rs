//! Periodic re-send of unacknowledged subscriptions.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::Subscriber;

/// Background task calling [`Subscriber::reconcile_pending`] on a fixed
/// period.
///
/// Holds only a weak reference, so it never keeps the subscriber alive; it
/// stops on its own once the subscriber is gone and is aborted on drop.
#[derive(Debug)]
pub struct ReconcileTask {
    handle: JoinHandle<()>,
}

impl ReconcileTask {
    /// Spawn onto the current runtime. The first run happens one `period`
    /// after spawning.
    #[must_use]
    pub fn spawn(subscriber: Weak<dyn Subscriber>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(subscriber) = subscriber.upgrade() else {
                    log::debug!("[Subscriptions] Subscriber dropped, stopping reconciliation");
                    break;
                };
                subscriber.reconcile_pending();
            }
        });

        Self { handle }
    }

    /// Whether the task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ReconcileTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::subscription::{Callback, Subscription, SubscriptionModel, SubscriptionState};

    #[derive(Default)]
    struct CountingSubscriber {
        reconciles: AtomicUsize,
    }

    impl Subscriber for CountingSubscriber {
        fn register_interest(
            &self,
            _model: SubscriptionModel,
            _callback: Option<Callback>,
        ) -> (SubscriptionState, Subscription) {
            unimplemented!()
        }
        fn subscribe(&self, _models: Vec<SubscriptionModel>) {}
        fn flush_queued(&self) {}
        fn reconcile_pending(&self) {
            self.reconciles.fetch_add(1, Ordering::SeqCst);
        }
        fn release_handle(&self, _handle: &Subscription) {}
        fn release_all_handles(&self) {}
        fn is_open(&self, _channel: &str) -> bool {
            false
        }
        fn on_subscribed(&self, _channel: &str) {}
        fn on_subscribe_failed(&self, _channel: &str) {}
        fn on_unsubscribed(&self, _channel: &str) {}
        fn callbacks(&self, _channel: &str) -> Vec<Callback> {
            Vec::new()
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_after_one_period() {
        let subscriber = Arc::new(CountingSubscriber::default());
        let weak: Weak<dyn Subscriber> = Arc::downgrade(&subscriber) as Weak<dyn Subscriber>;
        let _task = ReconcileTask::spawn(weak, Duration::from_secs(45));

        settle().await;
        assert_eq!(subscriber.reconciles.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(44)).await;
        settle().await;
        assert_eq!(subscriber.reconciles.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(subscriber.reconciles.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(45)).await;
        settle().await;
        assert_eq!(subscriber.reconciles.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_task() {
        let subscriber = Arc::new(CountingSubscriber::default());
        let weak: Weak<dyn Subscriber> = Arc::downgrade(&subscriber) as Weak<dyn Subscriber>;
        let task = ReconcileTask::spawn(weak, Duration::from_secs(45));
        drop(task);

        tokio::time::advance(Duration::from_secs(100)).await;
        settle().await;
        assert_eq!(subscriber.reconciles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_subscriber_dropped() {
        let subscriber = Arc::new(CountingSubscriber::default());
        let weak: Weak<dyn Subscriber> = Arc::downgrade(&subscriber) as Weak<dyn Subscriber>;
        let task = ReconcileTask::spawn(weak, Duration::from_secs(45));
        drop(subscriber);

        tokio::time::advance(Duration::from_secs(45)).await;
        settle().await;
        assert!(task.is_finished());
    }
}
