use crate::ledger::Participant;
use crate::{JackpotError, Result};
use serde::{Deserialize, Serialize};

/// Half-open ticket interval `[start, end)` owned by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRange {
    pub participant_id: String,
    pub start: u64,
    pub end: u64,
}

impl TicketRange {
    pub fn contains(&self, ticket: u64) -> bool {
        self.start <= ticket && ticket < self.end
    }
}

/// Cumulative ranges in participant insertion order. Participants holding no
/// tickets get an empty range. Fails if the ticket counts overflow `u64`.
pub fn ticket_ranges(participants: &[Participant]) -> Result<Vec<TicketRange>> {
    let mut start = 0u64;
    participants
        .iter()
        .map(|p| {
            let end = start
                .checked_add(p.tickets())
                .ok_or_else(|| JackpotError::selection("ticket count overflow"))?;
            let range = TicketRange {
                participant_id: p.id().to_string(),
                start,
                end,
            };
            start = end;
            Ok(range)
        })
        .collect()
}

/// Participant whose range contains `winning_ticket`.
///
/// Pure: the same participants in the same order with the same ticket always
/// give the same winner. Requires `0 <= winning_ticket < total_tickets` and
/// tickets summing to `total_tickets`.
pub fn select_winner<'a>(
    participants: &'a [Participant],
    total_tickets: u64,
    winning_ticket: u64,
) -> Result<&'a Participant> {
    if total_tickets == 0 {
        return Err(JackpotError::selection("round has no tickets"));
    }
    if winning_ticket >= total_tickets {
        return Err(JackpotError::selection(format!(
            "winning ticket {} outside [0, {})",
            winning_ticket, total_tickets
        )));
    }

    let held = participants
        .iter()
        .try_fold(0u64, |acc, p| acc.checked_add(p.tickets()))
        .ok_or_else(|| JackpotError::selection("ticket count overflow"))?;
    if held != total_tickets {
        return Err(JackpotError::selection(format!(
            "participants hold {} tickets, round records {}",
            held, total_tickets
        )));
    }

    let mut end = 0u64;
    for participant in participants {
        end += participant.tickets();
        if winning_ticket < end {
            return Ok(participant);
        }
    }

    Err(JackpotError::selection(format!(
        "no participant owns ticket {}",
        winning_ticket
    )))
}
