use crate::error::Result;
use crate::storage::Storage;
use chrono::Utc;
use rusqlite::params;

/// Ledger of assets handed back after a failed round.
///
/// Keyed by `(round_id, asset_id)`, so recording the same refund twice is a
/// no-op and callers may retry freely.
pub struct RefundStore<'a> {
    storage: &'a Storage,
}

impl<'a> RefundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Returns how many assets were newly recorded.
    pub async fn record_refund(&self, round_id: u64, asset_ids: &[String]) -> Result<usize> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp();

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO refunds (round_id, asset_id, recorded_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for asset_id in asset_ids {
                inserted += stmt.execute(params![round_id as i64, asset_id, now])?;
            }
        }
        tx.commit()?;

        tracing::info!(
            "Recorded refund of {} new asset(s) for round {}",
            inserted,
            round_id
        );
        Ok(inserted)
    }

    pub async fn list_refunds(&self, round_id: u64) -> Result<Vec<String>> {
        let conn = self.storage.get_connection().await;

        let mut stmt =
            conn.prepare("SELECT asset_id FROM refunds WHERE round_id = ?1 ORDER BY asset_id")?;
        let refund_iter = stmt.query_map(params![round_id as i64], |row| row.get(0))?;

        let mut assets = Vec::new();
        for asset in refund_iter {
            assets.push(asset?);
        }

        Ok(assets)
    }
}
