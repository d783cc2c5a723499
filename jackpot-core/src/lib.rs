//! Jackpot core - shared types, configuration and history storage
//!
//! Holds the fixed-point value type, round status and history records used by
//! the round engine, along with the SQLite archive that keeps finished rounds
//! auditable.

pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{DepositLimits, EngineConfig};
pub use error::{CoreError, Result};
pub use storage::{RefundStore, RoundStore, Storage};
pub use types::{Amount, Page, ParticipantRecord, RoundRecord, RoundStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(round_id: u64) -> RoundRecord {
        RoundRecord {
            round_id,
            status: RoundStatus::Completed,
            created_at: Utc::now(),
            closed_at: Utc::now(),
            total_value: Amount::from_minor(1500),
            total_tickets: 1500,
            winner: Some("alice".to_string()),
            winning_ticket: Some(12),
            server_seed: Some("aa".repeat(32)),
            server_seed_hash: "bb".repeat(32),
            client_seed: "client".to_string(),
            provable_hash: Some("cc".repeat(32)),
            error_reason: None,
            participants: vec![ParticipantRecord {
                participant_id: "alice".to_string(),
                items_value: Amount::from_minor(1500),
                tickets: 1500,
            }],
        }
    }

    #[tokio::test]
    async fn test_storage_creates_database_file() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("jackpot.db");
        let storage = Storage::new(&db_path).await.unwrap();

        RoundStore::new(&storage).save_round(&record(1)).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_round_store_roundtrip() {
        let storage = Storage::in_memory().await.unwrap();
        let store = RoundStore::new(&storage);

        store.save_round(&record(7)).await.unwrap();
        let loaded = store.load_round(7).await.unwrap();

        assert_eq!(loaded.status, RoundStatus::Completed);
        assert_eq!(loaded.winner.as_deref(), Some("alice"));
        assert_eq!(loaded.winning_ticket, Some(12));
        assert_eq!(loaded.participants.len(), 1);
        assert_eq!(loaded.total_value, Amount::from_minor(1500));

        assert!(matches!(
            store.load_round(8).await,
            Err(CoreError::RoundNotFound { round_id: 8 })
        ));
    }
}
