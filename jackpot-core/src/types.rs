use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Number of minor units in one whole unit of value.
pub const MINOR_UNITS: u64 = 100;

/// Fixed-point value in integer minor units (cents).
///
/// All cumulative sums are kept as integers so that totals and participant
/// shares never drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub const fn to_minor(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / MINOR_UNITS, self.0 % MINOR_UNITS)
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    /// Parses "12", "12.3" or "12.34". More than two decimals is rejected
    /// rather than rounded.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || CoreError::InvalidAmount(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(MINOR_UNITS)
            .and_then(|m| m.checked_add(frac))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

/// Lifecycle phase of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Active,
    Rolling,
    Completed,
    Error,
}

impl RoundStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RoundStatus::Completed | RoundStatus::Error)
    }

    pub fn accepts_deposits(self) -> bool {
        matches!(self, RoundStatus::Pending | RoundStatus::Active)
    }

    /// Whether the server seed may be disclosed in this phase.
    pub fn discloses_seed(self) -> bool {
        matches!(self, RoundStatus::Rolling | RoundStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Active => "active",
            RoundStatus::Rolling => "rolling",
            RoundStatus::Completed => "completed",
            RoundStatus::Error => "error",
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RoundStatus::Pending),
            "active" => Ok(RoundStatus::Active),
            "rolling" => Ok(RoundStatus::Rolling),
            "completed" => Ok(RoundStatus::Completed),
            "error" => Ok(RoundStatus::Error),
            other => Err(CoreError::internal(format!("Unknown round status: {}", other))),
        }
    }
}

/// Participant entry as archived with a round, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub participant_id: String,
    pub items_value: Amount,
    pub tickets: u64,
}

/// Persisted history record of a terminal round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_id: u64,
    pub status: RoundStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub total_value: Amount,
    pub total_tickets: u64,
    pub winner: Option<String>,
    pub winning_ticket: Option<u64>,
    /// Only present for completed rounds.
    pub server_seed: Option<String>,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub provable_hash: Option<String>,
    pub error_reason: Option<String>,
    pub participants: Vec<ParticipantRecord>,
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as u64)
    }
}
