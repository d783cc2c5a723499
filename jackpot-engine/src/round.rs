use crate::commitment::{provable_hash, winning_ticket, SeedCommitment};
use crate::ledger::{Participant, TicketLedger};
use crate::selector::{select_winner, ticket_ranges, TicketRange};
use crate::{JackpotError, Result};
use chrono::{DateTime, Duration, Utc};
use jackpot_core::{Amount, RoundRecord, RoundStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A deposited asset. Never changes once appended to a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub asset_id: String,
    pub value: Amount,
    pub participant_id: String,
}

/// Winner data produced when a round closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub round_id: u64,
    pub winner: String,
    pub winning_ticket: u64,
    pub server_seed: String,
    pub provable_hash: String,
    pub total_value: Amount,
    pub total_tickets: u64,
}

/// One round aggregate: commitment, ledger, items and outcome.
///
/// Only the deposit processor adds items and participants, and only the
/// lifecycle manager moves the status.
#[derive(Debug)]
pub struct Round {
    id: u64,
    status: RoundStatus,
    created_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    time_left_secs: i64,
    commitment: SeedCommitment,
    ledger: TicketLedger,
    items: Vec<Item>,
    asset_ids: HashSet<String>,
    winner: Option<String>,
    winning_ticket: Option<u64>,
    provable_hash: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    error_reason: Option<String>,
}

impl Round {
    pub fn new(
        id: u64,
        commitment: SeedCommitment,
        ticket_unit: Amount,
        duration_secs: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status: RoundStatus::Pending,
            created_at: now,
            deadline: None,
            time_left_secs: duration_secs as i64,
            commitment,
            ledger: TicketLedger::new(ticket_unit),
            items: Vec::new(),
            asset_ids: HashSet::new(),
            winner: None,
            winning_ticket: None,
            provable_hash: None,
            closed_at: None,
            error_reason: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn time_left_secs(&self) -> i64 {
        self.time_left_secs
    }

    pub fn server_seed_hash(&self) -> &str {
        self.commitment.server_seed_hash()
    }

    pub fn client_seed(&self) -> &str {
        self.commitment.client_seed()
    }

    /// Disclosed only while rolling or once completed.
    pub fn server_seed(&self) -> Option<&str> {
        if self.status.discloses_seed() {
            self.commitment.revealed_seed()
        } else {
            None
        }
    }

    pub fn ledger(&self) -> &TicketLedger {
        &self.ledger
    }

    pub fn participants(&self) -> &[Participant] {
        self.ledger.participants()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn has_asset(&self, asset_id: &str) -> bool {
        self.asset_ids.contains(asset_id)
    }

    pub fn total_value(&self) -> Amount {
        self.ledger.total_value()
    }

    pub fn total_tickets(&self) -> u64 {
        self.ledger.total_tickets()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn winning_ticket(&self) -> Option<u64> {
        self.winning_ticket
    }

    pub fn provable_hash(&self) -> Option<&str> {
        self.provable_hash.as_deref()
    }

    pub fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut TicketLedger {
        &mut self.ledger
    }

    pub(crate) fn append_items(&mut self, items: Vec<Item>) {
        for item in items {
            self.asset_ids.insert(item.asset_id.clone());
            self.items.push(item);
        }
    }

    /// pending -> active, arming the countdown.
    pub(crate) fn activate(&mut self, now: DateTime<Utc>, duration_secs: u32) -> Result<()> {
        if self.status != RoundStatus::Pending {
            return Err(JackpotError::invalid_state(format!(
                "Round {} cannot activate from {}",
                self.id, self.status
            )));
        }
        self.status = RoundStatus::Active;
        self.deadline = Some(now + Duration::seconds(duration_secs as i64));
        self.time_left_secs = duration_secs as i64;
        Ok(())
    }

    /// Recomputes the remaining time from the armed deadline, rounding up to
    /// whole seconds and never going below zero.
    pub(crate) fn update_time_left(&mut self, now: DateTime<Utc>) -> i64 {
        if let Some(deadline) = self.deadline {
            let millis = (deadline - now).num_milliseconds();
            self.time_left_secs = (millis + 999).div_euclid(1000).max(0);
        }
        self.time_left_secs
    }

    /// Compare-and-set active -> rolling. A round without tickets is refused
    /// and left untouched.
    pub(crate) fn begin_rolling(&mut self) -> Result<()> {
        let invalid = || {
            JackpotError::invalid_state(format!(
                "Round {} cannot start rolling from {}",
                self.id, self.status
            ))
        };
        if self.status.is_terminal() || self.status == RoundStatus::Rolling {
            return Err(invalid());
        }
        if self.ledger.total_tickets() == 0 {
            return Err(JackpotError::selection(format!(
                "round {} has no tickets",
                self.id
            )));
        }
        if self.status != RoundStatus::Active {
            return Err(invalid());
        }
        self.status = RoundStatus::Rolling;
        self.time_left_secs = 0;
        Ok(())
    }

    /// Reveals the seed, draws the winner and completes the round.
    pub(crate) fn settle(&mut self, now: DateTime<Utc>) -> Result<Settlement> {
        if self.status != RoundStatus::Rolling {
            return Err(JackpotError::invalid_state(format!(
                "Round {} is not rolling ({})",
                self.id, self.status
            )));
        }

        let server_seed = self.commitment.reveal(self.id)?;
        let hash = provable_hash(&server_seed, self.commitment.client_seed());
        let total_tickets = self.ledger.total_tickets();
        let ticket = winning_ticket(&hash, total_tickets)
            .ok_or_else(|| JackpotError::selection("provable hash yields no ticket"))?;
        let winner = select_winner(self.ledger.participants(), total_tickets, ticket)?
            .id()
            .to_string();

        self.winner = Some(winner.clone());
        self.winning_ticket = Some(ticket);
        self.provable_hash = Some(hash.clone());
        self.status = RoundStatus::Completed;
        self.closed_at = Some(now);

        Ok(Settlement {
            round_id: self.id,
            winner,
            winning_ticket: ticket,
            server_seed,
            provable_hash: hash,
            total_value: self.ledger.total_value(),
            total_tickets,
        })
    }

    /// Any non-terminal status -> error.
    pub(crate) fn fail(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(JackpotError::invalid_state(format!(
                "Round {} already {}",
                self.id, self.status
            )));
        }
        self.status = RoundStatus::Error;
        self.error_reason = Some(reason.to_string());
        self.closed_at = Some(now);
        Ok(())
    }

    pub fn ticket_ranges(&self) -> Result<Vec<TicketRange>> {
        ticket_ranges(self.ledger.participants())
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        // ledger totals are overflow-checked on every deposit
        let mut start = 0u64;
        let participants = self
            .ledger
            .participants()
            .iter()
            .map(|p| {
                let end = start.saturating_add(p.tickets());
                let view = ParticipantView {
                    participant_id: p.id().to_string(),
                    items_value: p.items_value(),
                    tickets: p.tickets(),
                    percentage: (self.ledger.percentage_of(p.id()) * 100.0).round() / 100.0,
                    ticket_start: start,
                    ticket_end: end,
                };
                start = end;
                view
            })
            .collect();

        RoundSnapshot {
            round_id: self.id,
            status: self.status,
            created_at: self.created_at,
            server_seed_hash: self.server_seed_hash().to_string(),
            client_seed: self.client_seed().to_string(),
            time_left: self.time_left_secs,
            total_value: self.total_value(),
            total_tickets: self.total_tickets(),
            participants,
            items: self.items.clone(),
            winner: self.winner.clone(),
            winning_ticket: self.winning_ticket,
            server_seed: self.server_seed().map(str::to_string),
            provable_hash: self.provable_hash.clone(),
        }
    }

    /// History record; only meaningful once the round is terminal.
    pub fn to_record(&self) -> RoundRecord {
        let completed = self.status == RoundStatus::Completed;
        RoundRecord {
            round_id: self.id,
            status: self.status,
            created_at: self.created_at,
            closed_at: self.closed_at.unwrap_or(self.created_at),
            total_value: self.total_value(),
            total_tickets: self.total_tickets(),
            winner: self.winner.clone(),
            winning_ticket: self.winning_ticket,
            server_seed: completed
                .then(|| self.commitment.revealed_seed().map(str::to_string))
                .flatten(),
            server_seed_hash: self.server_seed_hash().to_string(),
            client_seed: self.client_seed().to_string(),
            provable_hash: self.provable_hash.clone(),
            error_reason: self.error_reason.clone(),
            participants: self
                .ledger
                .participants()
                .iter()
                .map(Participant::to_record)
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn commitment_mut(&mut self) -> &mut SeedCommitment {
        &mut self.commitment
    }
}

/// Participant line of a snapshot, with its ticket range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub participant_id: String,
    pub items_value: Amount,
    pub tickets: u64,
    pub percentage: f64,
    pub ticket_start: u64,
    pub ticket_end: u64,
}

/// Read-only view of a round for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub status: RoundStatus,
    pub created_at: DateTime<Utc>,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub time_left: i64,
    pub total_value: Amount,
    pub total_tickets: u64,
    pub participants: Vec<ParticipantView>,
    pub items: Vec<Item>,
    pub winner: Option<String>,
    pub winning_ticket: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_seed: Option<String>,
    pub provable_hash: Option<String>,
}
