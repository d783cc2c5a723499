use crate::events::RoundEvent;
use crate::Result;
use async_trait::async_trait;
use jackpot_core::RoundRecord;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Side effects queued by the lifecycle manager, applied outside its lock.
#[derive(Debug, Clone)]
pub enum Dispatch {
    Publish(RoundEvent),
    Persist(RoundRecord),
    Refund { round_id: u64, asset_ids: Vec<String> },
}

pub type DispatchSender = mpsc::UnboundedSender<Dispatch>;
pub type DispatchReceiver = mpsc::UnboundedReceiver<Dispatch>;

pub fn dispatch_channel() -> (DispatchSender, DispatchReceiver) {
    mpsc::unbounded_channel()
}

/// Pushes events to observers over whatever transport is in use.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &RoundEvent) -> Result<()>;
}

/// Durable round history.
#[async_trait]
pub trait RoundArchive: Send + Sync {
    async fn save_round(&self, record: &RoundRecord) -> Result<()>;
}

/// Returns deposited assets after a failed round. Must be idempotent.
#[async_trait]
pub trait RefundHandler: Send + Sync {
    async fn refund(&self, round_id: u64, asset_ids: &[String]) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Exponential back-off before attempt `attempt + 1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Drains the dispatch queue, retrying each side effect on failure.
pub struct Dispatcher {
    publisher: Arc<dyn EventPublisher>,
    archive: Arc<dyn RoundArchive>,
    refunds: Arc<dyn RefundHandler>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        archive: Arc<dyn RoundArchive>,
        refunds: Arc<dyn RefundHandler>,
    ) -> Self {
        Self {
            publisher,
            archive,
            refunds,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn spawn(self, rx: DispatchReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Runs until every sender is dropped and all queued work is done.
    ///
    /// Publication, persistence and refunds each get their own lane, so a
    /// message retrying in one lane never holds up the others. Order is kept
    /// within a lane.
    pub async fn run(self, mut rx: DispatchReceiver) {
        let this = Arc::new(self);
        let (publish_tx, publish) = this.clone().lane("publish");
        let (persist_tx, persist) = this.clone().lane("persist");
        let (refund_tx, refund) = this.lane("refund");

        while let Some(dispatch) = rx.recv().await {
            let lane = match &dispatch {
                Dispatch::Publish(_) => &publish_tx,
                Dispatch::Persist(_) => &persist_tx,
                Dispatch::Refund { .. } => &refund_tx,
            };
            if lane.send(dispatch).is_err() {
                tracing::error!("Dispatch lane stopped, side effect dropped");
            }
        }

        drop((publish_tx, persist_tx, refund_tx));
        for (name, handle) in [("publish", publish), ("persist", persist), ("refund", refund)] {
            if let Err(e) = handle.await {
                tracing::error!("Dispatch lane {} failed: {}", name, e);
            }
        }
        tracing::debug!("Dispatch queue closed");
    }

    fn lane(self: Arc<Self>, name: &'static str) -> (DispatchSender, JoinHandle<()>) {
        let (tx, mut rx) = dispatch_channel();
        let handle = tokio::spawn(async move {
            while let Some(dispatch) = rx.recv().await {
                self.handle(dispatch).await;
            }
            tracing::debug!("Dispatch lane {} drained", name);
        });
        (tx, handle)
    }

    /// Returns whether the side effect eventually succeeded.
    pub async fn handle(&self, dispatch: Dispatch) -> bool {
        match dispatch {
            Dispatch::Publish(event) => {
                let what = format!("publish {} for round {}", event.kind(), event.round_id());
                self.attempt(&what, || self.publisher.publish(&event)).await
            }
            Dispatch::Persist(record) => {
                let what = format!("persist round {}", record.round_id);
                self.attempt(&what, || self.archive.save_round(&record)).await
            }
            Dispatch::Refund {
                round_id,
                asset_ids,
            } => {
                let what = format!("refund {} asset(s) of round {}", asset_ids.len(), round_id);
                self.attempt(&what, || self.refunds.refund(round_id, &asset_ids))
                    .await
            }
        }
    }

    async fn attempt<F, Fut>(&self, what: &str, mut op: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match op().await {
                Ok(()) => return true,
                Err(e) if attempt < max_attempts => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        "Failed to {} (attempt {}/{}): {}, retrying in {:?}",
                        what,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("Giving up on {} after {} attempts: {}", what, attempt, e);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JackpotError;
    use chrono::Utc;
    use jackpot_core::{Amount, RoundStatus};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FlakyPublisher {
        failures_left: AtomicU32,
        seen: Mutex<Vec<RoundEvent>>,
    }

    #[async_trait]
    impl EventPublisher for FlakyPublisher {
        async fn publish(&self, event: &RoundEvent) -> Result<()> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(JackpotError::internal("transport down"));
            }
            self.seen.lock().push(event.clone());
            Ok(())
        }
    }

    struct NoopArchive;

    #[async_trait]
    impl RoundArchive for NoopArchive {
        async fn save_round(&self, _record: &RoundRecord) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl RefundHandler for NoopArchive {
        async fn refund(&self, _round_id: u64, _asset_ids: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn dispatcher(publisher: Arc<FlakyPublisher>, max_attempts: u32) -> Dispatcher {
        Dispatcher::new(publisher, Arc::new(NoopArchive), Arc::new(NoopArchive)).with_retry(
            RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn test_publish_retried_until_success() {
        let publisher = Arc::new(FlakyPublisher::default());
        publisher.failures_left.store(2, Ordering::SeqCst);

        let ok = dispatcher(publisher.clone(), 3)
            .handle(Dispatch::Publish(RoundEvent::RoundCompleted { round_id: 1 }))
            .await;

        assert!(ok);
        assert_eq!(publisher.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let publisher = Arc::new(FlakyPublisher::default());
        publisher.failures_left.store(10, Ordering::SeqCst);

        let ok = dispatcher(publisher.clone(), 2)
            .handle(Dispatch::Publish(RoundEvent::RoundCompleted { round_id: 1 }))
            .await;

        assert!(!ok);
        assert!(publisher.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_queue_in_order() {
        let publisher = Arc::new(FlakyPublisher::default());
        let (tx, rx) = dispatch_channel();
        let handle = dispatcher(publisher.clone(), 1).spawn(rx);

        for round_id in 1..=3 {
            tx.send(Dispatch::Publish(RoundEvent::RoundRolling { round_id }))
                .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let ids: Vec<u64> = publisher.seen.lock().iter().map(|e| e.round_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    struct BrokenPublisher;

    #[async_trait]
    impl EventPublisher for BrokenPublisher {
        async fn publish(&self, _event: &RoundEvent) -> Result<()> {
            Err(JackpotError::internal("transport down"))
        }
    }

    #[derive(Default)]
    struct RecordingArchive {
        saved: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl RoundArchive for RecordingArchive {
        async fn save_round(&self, record: &RoundRecord) -> Result<()> {
            self.saved.lock().push(record.round_id);
            Ok(())
        }
    }

    fn record(round_id: u64) -> RoundRecord {
        RoundRecord {
            round_id,
            status: RoundStatus::Completed,
            created_at: Utc::now(),
            closed_at: Utc::now(),
            total_value: Amount::from_minor(100),
            total_tickets: 100,
            winner: Some("p1".to_string()),
            winning_ticket: Some(7),
            server_seed: None,
            server_seed_hash: "00".repeat(32),
            client_seed: "client".to_string(),
            provable_hash: None,
            error_reason: None,
            participants: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_failing_publish_does_not_delay_persist() {
        let archive = Arc::new(RecordingArchive::default());
        let dispatcher = Dispatcher::new(
            Arc::new(BrokenPublisher),
            archive.clone(),
            Arc::new(NoopArchive),
        )
        .with_retry(RetryPolicy::default());

        let (tx, rx) = dispatch_channel();
        let handle = dispatcher.spawn(rx);
        tx.send(Dispatch::Publish(RoundEvent::RoundCompleted { round_id: 1 }))
            .unwrap();
        tx.send(Dispatch::Persist(record(1))).unwrap();

        let saved = tokio::time::timeout(Duration::from_millis(500), async {
            while archive.saved.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(saved.is_ok(), "persist waited on the publish retries");
        assert_eq!(*archive.saved.lock(), vec![1]);

        drop(tx);
        handle.abort();
    }

    #[tokio::test]
    async fn test_lanes_keep_order_within_kind() {
        let archive = Arc::new(RecordingArchive::default());
        let dispatcher = Dispatcher::new(
            Arc::new(FlakyPublisher::default()),
            archive.clone(),
            Arc::new(NoopArchive),
        );

        let (tx, rx) = dispatch_channel();
        let handle = dispatcher.spawn(rx);
        for round_id in 1..=5 {
            tx.send(Dispatch::Persist(record(round_id))).unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*archive.saved.lock(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }
}
