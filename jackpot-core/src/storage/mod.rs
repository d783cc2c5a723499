pub mod refund_store;
pub mod round_store;

pub use refund_store::RefundStore;
pub use round_store::RoundStore;

use crate::error::{CoreError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    /// In-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Round history
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                round_id INTEGER PRIMARY KEY,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                closed_at INTEGER NOT NULL,
                total_value INTEGER NOT NULL,
                total_tickets INTEGER NOT NULL,
                winner TEXT,
                winning_ticket INTEGER,
                server_seed TEXT,
                server_seed_hash TEXT NOT NULL,
                client_seed TEXT NOT NULL,
                provable_hash TEXT,
                error_reason TEXT,
                participants TEXT NOT NULL
            )",
            [],
        )?;

        // Refund requests, one row per returned asset
        conn.execute(
            "CREATE TABLE IF NOT EXISTS refunds (
                round_id INTEGER NOT NULL,
                asset_id TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                PRIMARY KEY (round_id, asset_id)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
