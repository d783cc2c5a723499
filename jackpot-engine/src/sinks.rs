//! Stock collaborators for the dispatcher.

use crate::dispatch::{EventPublisher, RefundHandler, RoundArchive};
use crate::events::RoundEvent;
use crate::Result;
use async_trait::async_trait;
use jackpot_core::{RefundStore, RoundRecord, RoundStore, Storage};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Round history in SQLite.
pub struct SqliteArchive {
    storage: Arc<Storage>,
}

impl SqliteArchive {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RoundArchive for SqliteArchive {
    async fn save_round(&self, record: &RoundRecord) -> Result<()> {
        RoundStore::new(&self.storage).save_round(record).await?;
        Ok(())
    }
}

/// Records refunded assets in SQLite; re-recording is a no-op.
pub struct SqliteRefunds {
    storage: Arc<Storage>,
}

impl SqliteRefunds {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RefundHandler for SqliteRefunds {
    async fn refund(&self, round_id: u64, asset_ids: &[String]) -> Result<()> {
        RefundStore::new(&self.storage)
            .record_refund(round_id, asset_ids)
            .await?;
        Ok(())
    }
}

/// Writes every event to the log as JSON.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &RoundEvent) -> Result<()> {
        tracing::info!("event {}", event.to_json()?);
        Ok(())
    }
}

/// In-process fan-out to any number of subscribers.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<RoundEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &RoundEvent) -> Result<()> {
        // no subscribers is not an error
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
