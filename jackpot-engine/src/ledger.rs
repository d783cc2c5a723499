use crate::{JackpotError, Result};
use jackpot_core::{Amount, ParticipantRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A depositor in one round, with cumulative value and tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    id: String,
    items_value: Amount,
    tickets: u64,
}

impl Participant {
    pub fn new(id: impl Into<String>, items_value: Amount, tickets: u64) -> Self {
        Self {
            id: id.into(),
            items_value,
            tickets,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn items_value(&self) -> Amount {
        self.items_value
    }

    pub fn tickets(&self) -> u64 {
        self.tickets
    }

    pub fn to_record(&self) -> ParticipantRecord {
        ParticipantRecord {
            participant_id: self.id.clone(),
            items_value: self.items_value,
            tickets: self.tickets,
        }
    }
}

impl From<&ParticipantRecord> for Participant {
    fn from(record: &ParticipantRecord) -> Self {
        Participant::new(record.participant_id.clone(), record.items_value, record.tickets)
    }
}

/// Outcome of one ledger credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub tickets_added: u64,
    pub participant_value: Amount,
    pub participant_tickets: u64,
    pub total_value: Amount,
    pub total_tickets: u64,
    pub new_participant: bool,
}

/// Per-round record of value and tickets, in participant insertion order.
#[derive(Debug, Clone)]
pub struct TicketLedger {
    ticket_unit: Amount,
    participants: Vec<Participant>,
    index: HashMap<String, usize>,
    total_value: Amount,
    total_tickets: u64,
}

impl TicketLedger {
    pub fn new(ticket_unit: Amount) -> Self {
        Self {
            ticket_unit,
            participants: Vec::new(),
            index: HashMap::new(),
            total_value: Amount::ZERO,
            total_tickets: 0,
        }
    }

    /// Floor of `value / ticket_unit`, never less than one for a nonzero value.
    pub fn tickets_for(&self, value: Amount) -> u64 {
        if value.is_zero() {
            return 0;
        }
        let unit = self.ticket_unit.to_minor().max(1);
        (value.to_minor() / unit).max(1)
    }

    /// Credits `value` to `participant_id`, appending the participant on its
    /// first deposit.
    pub fn add_deposit(&mut self, participant_id: &str, value: Amount) -> Result<LedgerUpdate> {
        if value.is_zero() {
            return Err(JackpotError::InvalidDeposit(
                "Deposit value must be greater than 0".to_string(),
            ));
        }

        let tickets = self.tickets_for(value);
        let total_value = self
            .total_value
            .checked_add(value)
            .ok_or_else(|| JackpotError::InvalidDeposit("Round value overflow".to_string()))?;
        let total_tickets = self
            .total_tickets
            .checked_add(tickets)
            .ok_or_else(|| JackpotError::InvalidDeposit("Ticket count overflow".to_string()))?;

        let new_participant = !self.index.contains_key(participant_id);
        let position = match self.index.get(participant_id) {
            Some(&position) => position,
            None => {
                self.participants
                    .push(Participant::new(participant_id, Amount::ZERO, 0));
                let position = self.participants.len() - 1;
                self.index.insert(participant_id.to_string(), position);
                position
            }
        };

        let participant = &mut self.participants[position];
        participant.items_value += value;
        participant.tickets += tickets;

        self.total_value = total_value;
        self.total_tickets = total_tickets;

        Ok(LedgerUpdate {
            tickets_added: tickets,
            participant_value: participant.items_value,
            participant_tickets: participant.tickets,
            total_value,
            total_tickets,
            new_participant,
        })
    }

    /// Share of tickets held by the participant, in percent. Display only.
    pub fn percentage_of(&self, participant_id: &str) -> f64 {
        if self.total_tickets == 0 {
            return 0.0;
        }
        self.participant(participant_id)
            .map(|p| p.tickets as f64 * 100.0 / self.total_tickets as f64)
            .unwrap_or(0.0)
    }

    pub fn contains(&self, participant_id: &str) -> bool {
        self.index.contains_key(participant_id)
    }

    pub fn participant(&self, participant_id: &str) -> Option<&Participant> {
        self.index
            .get(participant_id)
            .map(|&position| &self.participants[position])
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn total_value(&self) -> Amount {
        self.total_value
    }

    pub fn total_tickets(&self) -> u64 {
        self.total_tickets
    }

    pub fn ticket_unit(&self) -> Amount {
        self.ticket_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(minor: u64) -> Amount {
        Amount::from_minor(minor)
    }

    #[test]
    fn test_tickets_round_down_with_minimum_one() {
        let ledger = TicketLedger::new(amount(10));
        assert_eq!(ledger.tickets_for(amount(0)), 0);
        assert_eq!(ledger.tickets_for(amount(3)), 1);
        assert_eq!(ledger.tickets_for(amount(10)), 1);
        assert_eq!(ledger.tickets_for(amount(19)), 1);
        assert_eq!(ledger.tickets_for(amount(20)), 2);
    }

    #[test]
    fn test_add_deposit_accumulates_in_order() {
        let mut ledger = TicketLedger::new(amount(1));

        let first = ledger.add_deposit("alice", amount(100)).unwrap();
        assert!(first.new_participant);
        assert_eq!(first.tickets_added, 100);

        ledger.add_deposit("bob", amount(50)).unwrap();
        let again = ledger.add_deposit("alice", amount(25)).unwrap();
        assert!(!again.new_participant);
        assert_eq!(again.participant_value, amount(125));
        assert_eq!(again.participant_tickets, 125);
        assert_eq!(again.total_tickets, 175);

        let ids: Vec<&str> = ledger.participants().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["alice", "bob"]);
    }

    #[test]
    fn test_totals_match_participant_sums() {
        let mut ledger = TicketLedger::new(amount(7));
        for (i, value) in [13u64, 7, 1, 99, 250, 6].iter().enumerate() {
            let id = format!("p{}", i % 3);
            ledger.add_deposit(&id, amount(*value)).unwrap();
        }

        let value_sum: Amount = ledger.participants().iter().map(|p| p.items_value()).sum();
        let ticket_sum: u64 = ledger.participants().iter().map(|p| p.tickets()).sum();
        assert_eq!(value_sum, ledger.total_value());
        assert_eq!(ticket_sum, ledger.total_tickets());
    }

    #[test]
    fn test_zero_value_rejected_without_change() {
        let mut ledger = TicketLedger::new(amount(1));
        assert!(ledger.add_deposit("alice", Amount::ZERO).is_err());
        assert_eq!(ledger.participant_count(), 0);
        assert_eq!(ledger.total_tickets(), 0);
    }

    #[test]
    fn test_percentage_of() {
        let mut ledger = TicketLedger::new(amount(1));
        assert_eq!(ledger.percentage_of("alice"), 0.0);

        ledger.add_deposit("alice", amount(25)).unwrap();
        ledger.add_deposit("bob", amount(75)).unwrap();
        assert!((ledger.percentage_of("alice") - 25.0).abs() < f64::EPSILON);
        assert!((ledger.percentage_of("bob") - 75.0).abs() < f64::EPSILON);
        assert_eq!(ledger.percentage_of("carol"), 0.0);
    }
}
