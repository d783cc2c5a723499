use crate::error::{CoreError, Result};
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Round engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Countdown armed by the first deposit of a round.
    pub round_duration_secs: u32,
    /// Pause between a terminal round and the next one.
    pub intermission_secs: u32,
    /// Value (minor units) bought by one ticket.
    pub ticket_unit: Amount,
    /// Smallest accepted deposit value, zero disables the check.
    pub min_deposit_value: Amount,
    pub max_participants: usize,
    pub max_items: usize,
    pub max_items_per_deposit: usize,
    /// Fixed public client seed. When unset each round derives its own.
    pub client_seed: Option<String>,
    /// Terminal rounds kept in memory for snapshots and verification.
    pub archive_capacity: usize,
}

/// Round-level caps enforced by the deposit processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositLimits {
    pub max_participants: usize,
    pub max_items: usize,
    pub max_items_per_deposit: usize,
    pub min_deposit_value: Amount,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 120,
            intermission_secs: 10,
            ticket_unit: Amount::from_minor(1),
            min_deposit_value: Amount::ZERO,
            max_participants: 10,
            max_items: 50,
            max_items_per_deposit: 10,
            client_seed: None,
            archive_capacity: 50,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn limits(&self) -> DepositLimits {
        DepositLimits {
            max_participants: self.max_participants,
            max_items: self.max_items,
            max_items_per_deposit: self.max_items_per_deposit,
            min_deposit_value: self.min_deposit_value,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.round_duration_secs == 0 {
            return Err(CoreError::config("Round duration must be greater than 0"));
        }

        if self.ticket_unit.is_zero() {
            return Err(CoreError::config("Ticket unit must be greater than 0"));
        }

        if self.max_participants == 0 || self.max_items == 0 || self.max_items_per_deposit == 0 {
            return Err(CoreError::config("Round caps must be greater than 0"));
        }

        if self.max_items_per_deposit > self.max_items {
            return Err(CoreError::config(
                "Per-deposit item cap cannot exceed the round item cap",
            ));
        }

        if matches!(&self.client_seed, Some(seed) if seed.is_empty()) {
            return Err(CoreError::config("Client seed cannot be empty"));
        }

        Ok(())
    }
}
