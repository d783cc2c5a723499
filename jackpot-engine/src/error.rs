use jackpot_core::RoundStatus;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JackpotError>;

/// Which round-level cap a deposit ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Participants { max: usize },
    Items { max: usize },
    PerDeposit { max: usize },
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Participants { max } => write!(f, "participant limit of {} reached", max),
            Limit::Items { max } => write!(f, "item limit of {} reached", max),
            Limit::PerDeposit { max } => write!(f, "at most {} items per deposit", max),
        }
    }
}

/// Broad class of a failure, for callers deciding how to surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    State,
    LimitExceeded,
    CryptoIntegrity,
    Selection,
    Internal,
}

#[derive(Error, Debug)]
pub enum JackpotError {
    #[error("Jackpot core error: {0}")]
    Core(#[from] jackpot_core::CoreError),

    #[error("Invalid deposit: {0}")]
    InvalidDeposit(String),

    #[error("Deposit contains no items")]
    EmptyDeposit,

    #[error("Invalid value for item {asset_id}")]
    InvalidItemValue { asset_id: String },

    #[error("Deposit of {value} is below the minimum of {min}")]
    BelowMinimumDeposit {
        value: jackpot_core::Amount,
        min: jackpot_core::Amount,
    },

    #[error("Round {round_id} is not accepting deposits (status: {status})")]
    RoundNotActive { round_id: u64, status: RoundStatus },

    #[error("Invalid round state: {0}")]
    InvalidState(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(Limit),

    #[error("Revealed server seed does not match the commitment of round {round_id}")]
    CryptoIntegrity { round_id: u64 },

    #[error("Cannot select a winner: {0}")]
    Selection(String),

    #[error("Round not found: {0}")]
    RoundNotFound(u64),

    #[error("Invalid event payload: {0}")]
    InvalidEvent(String),

    #[error("Entropy source failed: {0}")]
    Entropy(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JackpotError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn selection(msg: impl Into<String>) -> Self {
        Self::Selection(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            JackpotError::InvalidDeposit(_)
            | JackpotError::EmptyDeposit
            | JackpotError::InvalidItemValue { .. }
            | JackpotError::BelowMinimumDeposit { .. }
            | JackpotError::InvalidEvent(_) => ErrorCategory::Validation,
            JackpotError::RoundNotActive { .. }
            | JackpotError::InvalidState(_)
            | JackpotError::RoundNotFound(_) => ErrorCategory::State,
            JackpotError::LimitExceeded(_) => ErrorCategory::LimitExceeded,
            JackpotError::CryptoIntegrity { .. } => ErrorCategory::CryptoIntegrity,
            JackpotError::Selection(_) => ErrorCategory::Selection,
            JackpotError::Core(_)
            | JackpotError::Entropy(_)
            | JackpotError::Serialization(_)
            | JackpotError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable code for the caller.
    pub fn reason(&self) -> &'static str {
        match self {
            JackpotError::InvalidDeposit(_) => "invalid_deposit",
            JackpotError::EmptyDeposit => "empty_deposit",
            JackpotError::InvalidItemValue { .. } => "invalid_item_value",
            JackpotError::BelowMinimumDeposit { .. } => "below_minimum_deposit",
            JackpotError::RoundNotActive { .. } => "round_not_active",
            JackpotError::InvalidState(_) => "invalid_state",
            JackpotError::LimitExceeded(Limit::Participants { .. }) => "participant_limit_reached",
            JackpotError::LimitExceeded(Limit::Items { .. }) => "item_limit_reached",
            JackpotError::LimitExceeded(Limit::PerDeposit { .. }) => "per_deposit_limit_exceeded",
            JackpotError::CryptoIntegrity { .. } => "crypto_integrity",
            JackpotError::Selection(_) => "selection",
            JackpotError::RoundNotFound(_) => "round_not_found",
            JackpotError::InvalidEvent(_) => "invalid_event",
            JackpotError::Entropy(_) => "entropy",
            JackpotError::Core(_) | JackpotError::Serialization(_) | JackpotError::Internal(_) => {
                "internal"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_reasons_name_the_cap() {
        let err = JackpotError::LimitExceeded(Limit::Participants { max: 2 });
        assert_eq!(err.reason(), "participant_limit_reached");
        assert_eq!(err.category(), ErrorCategory::LimitExceeded);
        assert_eq!(err.to_string(), "Limit exceeded: participant limit of 2 reached");

        let err = JackpotError::LimitExceeded(Limit::PerDeposit { max: 3 });
        assert_eq!(err.reason(), "per_deposit_limit_exceeded");
    }

    #[test]
    fn test_round_closed_is_a_state_error() {
        let err = JackpotError::RoundNotActive {
            round_id: 4,
            status: RoundStatus::Rolling,
        };
        assert_eq!(err.category(), ErrorCategory::State);
        assert_eq!(err.reason(), "round_not_active");
    }
}
