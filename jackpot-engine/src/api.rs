//! Request/response shapes exchanged with callers of the engine.

use crate::commitment;
use crate::deposit::{DepositItem, DepositReceipt};
use crate::ledger::Participant;
use crate::selector::select_winner;
use crate::{JackpotError, Result};
use jackpot_core::{Amount, RoundRecord, RoundStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Round the caller believes is open. Rejected if another round is.
    #[serde(default)]
    pub round_id: Option<u64>,
    pub participant_id: String,
    pub items: Vec<DepositItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_cumulative_value: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_tickets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_total_value: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_total_tickets: Option<u64>,
}

impl DepositResponse {
    pub fn accepted(receipt: &DepositReceipt) -> Self {
        Self {
            accepted: true,
            reason: None,
            message: None,
            participant_cumulative_value: Some(receipt.participant_value),
            participant_tickets: Some(receipt.participant_tickets),
            round_total_value: Some(receipt.round_total_value),
            round_total_tickets: Some(receipt.round_total_tickets),
        }
    }

    pub fn rejected(err: &JackpotError) -> Self {
        Self {
            accepted: false,
            reason: Some(err.reason().to_string()),
            message: Some(err.to_string()),
            participant_cumulative_value: None,
            participant_tickets: None,
            round_total_value: None,
            round_total_tickets: None,
        }
    }
}

impl From<Result<DepositReceipt>> for DepositResponse {
    fn from(result: Result<DepositReceipt>) -> Self {
        match result {
            Ok(receipt) => DepositResponse::accepted(&receipt),
            Err(e) => DepositResponse::rejected(&e),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub round_id: u64,
    pub server_seed: String,
    pub client_seed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundVerification {
    pub round_id: u64,
    pub verified: bool,
    pub hash_matches: bool,
    pub client_seed_matches: bool,
    pub provable_hash: String,
    pub recomputed_winning_ticket: Option<u64>,
    pub recomputed_winner: Option<String>,
}

/// Recomputes a finished round from the supplied seeds and compares the
/// result with what was recorded.
pub fn verify_record(
    record: &RoundRecord,
    server_seed: &str,
    client_seed: &str,
) -> Result<RoundVerification> {
    let winning_ticket = match (record.status, record.winning_ticket) {
        (RoundStatus::Completed, Some(ticket)) => ticket,
        _ => {
            return Err(JackpotError::invalid_state(format!(
                "Round {} has no drawn winner ({})",
                record.round_id, record.status
            )))
        }
    };

    let seeds = commitment::verify(
        server_seed,
        client_seed,
        record.total_tickets,
        &record.server_seed_hash,
        winning_ticket,
    );

    let participants: Vec<Participant> = record.participants.iter().map(Participant::from).collect();
    let recomputed_winner = seeds.recomputed_winning_ticket.and_then(|ticket| {
        select_winner(&participants, record.total_tickets, ticket)
            .ok()
            .map(|p| p.id().to_string())
    });

    let client_seed_matches = client_seed == record.client_seed;
    let verified = seeds.verified && client_seed_matches && recomputed_winner == record.winner;

    Ok(RoundVerification {
        round_id: record.round_id,
        verified,
        hash_matches: seeds.hash_matches,
        client_seed_matches,
        provable_hash: seeds.provable_hash,
        recomputed_winning_ticket: seeds.recomputed_winning_ticket,
        recomputed_winner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jackpot_core::ParticipantRecord;

    const SERVER_SEED: &str = "5f1d3c2b9a8e7f6d5c4b3a29180706f5e4d3c2b1a09f8e7d6c5b4a3928170605";

    fn completed_record() -> RoundRecord {
        RoundRecord {
            round_id: 11,
            status: RoundStatus::Completed,
            created_at: Utc::now(),
            closed_at: Utc::now(),
            total_value: Amount::from_minor(100),
            total_tickets: 100,
            winner: Some("p2".to_string()),
            winning_ticket: Some(42),
            server_seed: Some(SERVER_SEED.to_string()),
            server_seed_hash: "6a9a185965a53fabfe7d3302e084c641795fad79306b65b55dc58f1d5aaa0703"
                .to_string(),
            client_seed: "client-30".to_string(),
            provable_hash: None,
            error_reason: None,
            participants: vec![
                ParticipantRecord {
                    participant_id: "p1".to_string(),
                    items_value: Amount::from_minor(1),
                    tickets: 1,
                },
                ParticipantRecord {
                    participant_id: "p2".to_string(),
                    items_value: Amount::from_minor(99),
                    tickets: 99,
                },
            ],
        }
    }

    #[test]
    fn test_verify_record_recomputes_winner() {
        let result = verify_record(&completed_record(), SERVER_SEED, "client-30").unwrap();
        assert!(result.verified);
        assert_eq!(result.recomputed_winning_ticket, Some(42));
        assert_eq!(result.recomputed_winner.as_deref(), Some("p2"));
    }

    #[test]
    fn test_verify_record_with_other_client_seed_fails() {
        let result = verify_record(&completed_record(), SERVER_SEED, "client-31").unwrap();
        assert!(result.hash_matches);
        assert!(!result.client_seed_matches);
        assert!(!result.verified);
    }

    #[test]
    fn test_failed_round_cannot_be_verified() {
        let mut record = completed_record();
        record.status = RoundStatus::Error;
        record.winning_ticket = None;
        assert!(verify_record(&record, SERVER_SEED, "client-30").is_err());
    }

    #[test]
    fn test_overflowing_record_does_not_verify() {
        let mut record = completed_record();
        record.total_tickets = u64::MAX;
        record.participants[0].tickets = u64::MAX;
        record.participants[1].tickets = 2;

        let result = verify_record(&record, SERVER_SEED, "client-30").unwrap();
        assert!(result.recomputed_winner.is_none());
        assert!(!result.verified);
    }

    #[test]
    fn test_response_carries_reason() {
        let response = DepositResponse::rejected(&JackpotError::EmptyDeposit);
        assert!(!response.accepted);
        assert_eq!(response.reason.as_deref(), Some("empty_deposit"));

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("round_total_value"));
    }
}
