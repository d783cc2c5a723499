use crate::error::{CoreError, Result};
use crate::storage::Storage;
use crate::types::{Amount, Page, ParticipantRecord, RoundRecord, RoundStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

const ROUND_COLUMNS: &str = "round_id, status, created_at, closed_at, total_value, total_tickets, \
     winner, winning_ticket, server_seed, server_seed_hash, client_seed, provable_hash, \
     error_reason, participants";

pub struct RoundStore<'a> {
    storage: &'a Storage,
}

impl<'a> RoundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Insert or replace a history record. Safe to retry.
    pub async fn save_round(&self, record: &RoundRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        let participants_json = serde_json::to_string(&record.participants)?;

        conn.execute(
            "INSERT OR REPLACE INTO rounds
             (round_id, status, created_at, closed_at, total_value, total_tickets, winner,
              winning_ticket, server_seed, server_seed_hash, client_seed, provable_hash,
              error_reason, participants)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.round_id as i64,
                record.status.as_str(),
                record.created_at.timestamp(),
                record.closed_at.timestamp(),
                record.total_value.to_minor() as i64,
                record.total_tickets as i64,
                record.winner,
                record.winning_ticket.map(|t| t as i64),
                record.server_seed,
                record.server_seed_hash,
                record.client_seed,
                record.provable_hash,
                record.error_reason,
                participants_json,
            ],
        )?;

        tracing::debug!("Saved round {} ({})", record.round_id, record.status);
        Ok(())
    }

    pub async fn load_round(&self, round_id: u64) -> Result<RoundRecord> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rounds WHERE round_id = ?1",
            ROUND_COLUMNS
        ))?;

        match stmt.query_row(params![round_id as i64], read_round) {
            Ok(record) => Ok(record),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(CoreError::RoundNotFound { round_id }),
            Err(e) => Err(e.into()),
        }
    }

    /// Newest first. `page` starts at 1.
    pub async fn list_rounds(&self, page: u32, per_page: u32) -> Result<Page<RoundRecord>> {
        if page == 0 || per_page == 0 {
            return Err(CoreError::config("Page and page size must be greater than 0"));
        }

        let conn = self.storage.get_connection().await;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM rounds", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rounds ORDER BY round_id DESC LIMIT ?1 OFFSET ?2",
            ROUND_COLUMNS
        ))?;

        let offset = (page as i64 - 1) * per_page as i64;
        let round_iter = stmt.query_map(params![per_page as i64, offset], read_round)?;

        let mut items = Vec::new();
        for round in round_iter {
            items.push(round?);
        }

        Ok(Page {
            items,
            page,
            per_page,
            total: total as u64,
        })
    }

    pub async fn count_rounds(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM rounds", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Highest archived round id, used to continue the sequence after restart.
    pub async fn last_round_id(&self) -> Result<Option<u64>> {
        let conn = self.storage.get_connection().await;
        let last: Option<i64> =
            conn.query_row("SELECT MAX(round_id) FROM rounds", [], |row| row.get(0))?;
        Ok(last.map(|id| id as u64))
    }
}

fn read_round(row: &Row<'_>) -> rusqlite::Result<RoundRecord> {
    let status_str: String = row.get(1)?;
    let status: RoundStatus = status_str.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(1, "status".to_string(), rusqlite::types::Type::Text)
    })?;

    let participants_str: String = row.get(13)?;
    let participants: Vec<ParticipantRecord> =
        serde_json::from_str(&participants_str).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                13,
                "participants".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;

    let winning_ticket: Option<i64> = row.get(7)?;

    Ok(RoundRecord {
        round_id: row.get::<_, i64>(0)? as u64,
        status,
        created_at: DateTime::from_timestamp(row.get(2)?, 0).unwrap_or_else(Utc::now),
        closed_at: DateTime::from_timestamp(row.get(3)?, 0).unwrap_or_else(Utc::now),
        total_value: Amount::from_minor(row.get::<_, i64>(4)? as u64),
        total_tickets: row.get::<_, i64>(5)? as u64,
        winner: row.get(6)?,
        winning_ticket: winning_ticket.map(|t| t as u64),
        server_seed: row.get(8)?,
        server_seed_hash: row.get(9)?,
        client_seed: row.get(10)?,
        provable_hash: row.get(11)?,
        error_reason: row.get(12)?,
        participants,
    })
}
