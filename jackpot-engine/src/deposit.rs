use crate::error::Limit;
use crate::round::{Item, Round};
use crate::{JackpotError, Result};
use jackpot_core::{Amount, DepositLimits};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// One item offered in a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositItem {
    pub asset_id: String,
    pub value: Amount,
}

impl DepositItem {
    pub fn new(asset_id: impl Into<String>, value: Amount) -> Self {
        Self {
            asset_id: asset_id.into(),
            value,
        }
    }
}

/// What an accepted deposit changed. Also the payload observers are told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub deposit_id: Uuid,
    pub round_id: u64,
    pub participant_id: String,
    pub deposit_value: Amount,
    pub tickets_added: u64,
    pub participant_value: Amount,
    pub participant_tickets: u64,
    pub round_total_value: Amount,
    pub round_total_tickets: u64,
    pub new_participant: bool,
}

/// Validates deposits against round caps and applies them to the ledger.
#[derive(Debug, Clone)]
pub struct DepositProcessor {
    limits: DepositLimits,
}

impl DepositProcessor {
    pub fn new(limits: DepositLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &DepositLimits {
        &self.limits
    }

    /// Applies the deposit, or rejects it leaving the round untouched.
    pub fn apply(
        &self,
        round: &mut Round,
        participant_id: &str,
        items: &[DepositItem],
    ) -> Result<DepositReceipt> {
        let deposit_value = self.validate(round, participant_id, items)?;

        let update = round.ledger_mut().add_deposit(participant_id, deposit_value)?;
        round.append_items(
            items
                .iter()
                .map(|item| Item {
                    asset_id: item.asset_id.clone(),
                    value: item.value,
                    participant_id: participant_id.to_string(),
                })
                .collect(),
        );

        Ok(DepositReceipt {
            deposit_id: Uuid::new_v4(),
            round_id: round.id(),
            participant_id: participant_id.to_string(),
            deposit_value,
            tickets_added: update.tickets_added,
            participant_value: update.participant_value,
            participant_tickets: update.participant_tickets,
            round_total_value: update.total_value,
            round_total_tickets: update.total_tickets,
            new_participant: update.new_participant,
        })
    }

    /// Returns the deposit's total value when every check passes.
    fn validate(&self, round: &Round, participant_id: &str, items: &[DepositItem]) -> Result<Amount> {
        if !round.status().accepts_deposits() {
            return Err(JackpotError::RoundNotActive {
                round_id: round.id(),
                status: round.status(),
            });
        }

        if participant_id.trim().is_empty() {
            return Err(JackpotError::InvalidDeposit(
                "Participant id cannot be empty".to_string(),
            ));
        }

        if items.is_empty() {
            return Err(JackpotError::EmptyDeposit);
        }

        let mut seen = HashSet::new();
        let mut total = Amount::ZERO;
        for item in items {
            if item.asset_id.trim().is_empty() {
                return Err(JackpotError::InvalidDeposit(
                    "Asset id cannot be empty".to_string(),
                ));
            }
            if item.value.is_zero() {
                return Err(JackpotError::InvalidItemValue {
                    asset_id: item.asset_id.clone(),
                });
            }
            if !seen.insert(item.asset_id.as_str()) || round.has_asset(&item.asset_id) {
                return Err(JackpotError::InvalidDeposit(format!(
                    "Asset {} already deposited",
                    item.asset_id
                )));
            }
            total = total
                .checked_add(item.value)
                .ok_or_else(|| JackpotError::InvalidDeposit("Deposit value overflow".to_string()))?;
        }

        if items.len() > self.limits.max_items_per_deposit {
            return Err(JackpotError::LimitExceeded(Limit::PerDeposit {
                max: self.limits.max_items_per_deposit,
            }));
        }

        if round.items().len() + items.len() > self.limits.max_items {
            return Err(JackpotError::LimitExceeded(Limit::Items {
                max: self.limits.max_items,
            }));
        }

        if !round.ledger().contains(participant_id)
            && round.ledger().participant_count() >= self.limits.max_participants
        {
            return Err(JackpotError::LimitExceeded(Limit::Participants {
                max: self.limits.max_participants,
            }));
        }

        if total < self.limits.min_deposit_value {
            return Err(JackpotError::BelowMinimumDeposit {
                value: total,
                min: self.limits.min_deposit_value,
            });
        }

        Ok(total)
    }
}
