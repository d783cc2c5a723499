use crate::{JackpotError, Result};
use jackpot_core::Amount;
use serde::{Deserialize, Serialize};

/// Outbound domain events, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoundEvent {
    RoundCreated {
        round_id: u64,
        server_seed_hash: String,
        client_seed: String,
    },
    ParticipantUpdated {
        round_id: u64,
        participant_id: String,
        deposit_value: Amount,
        cumulative_value: Amount,
        tickets: u64,
        round_total_value: Amount,
    },
    RoundRolling {
        round_id: u64,
    },
    RoundWinner {
        round_id: u64,
        winner: String,
        winning_ticket: u64,
        server_seed: String,
        provable_hash: String,
    },
    RoundCompleted {
        round_id: u64,
    },
    RoundError {
        round_id: u64,
        reason: String,
    },
}

impl RoundEvent {
    pub fn round_id(&self) -> u64 {
        match self {
            RoundEvent::RoundCreated { round_id, .. }
            | RoundEvent::ParticipantUpdated { round_id, .. }
            | RoundEvent::RoundRolling { round_id }
            | RoundEvent::RoundWinner { round_id, .. }
            | RoundEvent::RoundCompleted { round_id }
            | RoundEvent::RoundError { round_id, .. } => *round_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RoundEvent::RoundCreated { .. } => "round_created",
            RoundEvent::ParticipantUpdated { .. } => "participant_updated",
            RoundEvent::RoundRolling { .. } => "round_rolling",
            RoundEvent::RoundWinner { .. } => "round_winner",
            RoundEvent::RoundCompleted { .. } => "round_completed",
            RoundEvent::RoundError { .. } => "round_error",
        }
    }

    /// Checks the fields serde cannot: non-empty ids, well-formed digests and
    /// consistent amounts.
    pub fn validate(&self) -> Result<()> {
        match self {
            RoundEvent::RoundCreated {
                server_seed_hash,
                client_seed,
                ..
            } => {
                require_digest("server_seed_hash", server_seed_hash)?;
                require_non_empty("client_seed", client_seed)
            }
            RoundEvent::ParticipantUpdated {
                participant_id,
                deposit_value,
                cumulative_value,
                tickets,
                round_total_value,
                ..
            } => {
                require_non_empty("participant_id", participant_id)?;
                if deposit_value.is_zero() || *tickets == 0 {
                    return Err(invalid("participant update without value or tickets"));
                }
                if deposit_value > cumulative_value || cumulative_value > round_total_value {
                    return Err(invalid("participant update amounts are inconsistent"));
                }
                Ok(())
            }
            RoundEvent::RoundWinner {
                winner,
                server_seed,
                provable_hash,
                ..
            } => {
                require_non_empty("winner", winner)?;
                require_non_empty("server_seed", server_seed)?;
                require_digest("provable_hash", provable_hash)
            }
            RoundEvent::RoundError { reason, .. } => require_non_empty("reason", reason),
            RoundEvent::RoundRolling { .. } | RoundEvent::RoundCompleted { .. } => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses and validates an event received across a process boundary.
    pub fn from_json(payload: &str) -> Result<Self> {
        let event: RoundEvent = serde_json::from_str(payload)
            .map_err(|e| JackpotError::InvalidEvent(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }
}

fn invalid(msg: &str) -> JackpotError {
    JackpotError::InvalidEvent(msg.to_string())
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(JackpotError::InvalidEvent(format!("{} is required", field)));
    }
    Ok(())
}

fn require_digest(field: &str, value: &str) -> Result<()> {
    if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(JackpotError::InvalidEvent(format!(
            "{} must be a 64 character hex digest",
            field
        )));
    }
    Ok(())
}
