use crate::api::{verify_record, DepositRequest, DepositResponse, RoundVerification};
use crate::commitment::SeedCommitment;
use crate::deposit::{DepositItem, DepositProcessor, DepositReceipt};
use crate::dispatch::{Dispatch, DispatchSender};
use crate::events::RoundEvent;
use crate::round::{Round, RoundSnapshot, Settlement};
use crate::{JackpotError, Result};
use chrono::{DateTime, Duration, Utc};
use jackpot_core::{EngineConfig, RoundRecord, RoundStatus};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;

/// What a tick did to the open round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No deposit yet, the countdown is not armed.
    Waiting,
    Counting { time_left: i64 },
    /// Countdown over but nothing to draw from.
    Stalled,
    Rolled(Settlement),
    /// Round is terminal, the next one opens after the pause.
    Intermission { round_id: u64, opens_in: i64 },
    NewRound { round_id: u64 },
}

struct EngineState {
    round: Round,
    next_round_id: u64,
    next_round_at: Option<DateTime<Utc>>,
}

/// Owns the open round and drives it through
/// pending -> active -> rolling -> completed, or into error.
///
/// Every mutation takes the same lock, so a deposit racing the timer either
/// lands before rolling starts or is rejected. Persistence, events and refunds
/// leave through the dispatch queue and never run under the lock.
pub struct RoundLifecycleManager {
    config: EngineConfig,
    processor: DepositProcessor,
    state: Mutex<EngineState>,
    archive: RwLock<VecDeque<RoundRecord>>,
    dispatch: DispatchSender,
}

impl RoundLifecycleManager {
    /// Opens round `first_round_id` in pending state.
    pub fn new(config: EngineConfig, dispatch: DispatchSender, first_round_id: u64) -> Result<Self> {
        config.validate()?;

        let now = Utc::now();
        let round = build_round(&config, first_round_id, now)?;

        let manager = Self {
            processor: DepositProcessor::new(config.limits()),
            state: Mutex::new(EngineState {
                round,
                next_round_id: first_round_id + 1,
                next_round_at: None,
            }),
            archive: RwLock::new(VecDeque::new()),
            dispatch,
            config,
        };

        {
            let state = manager.state.lock();
            manager.announce_round(&state.round);
        }

        Ok(manager)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_round_id(&self) -> u64 {
        self.state.lock().round.id()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        self.state.lock().round.snapshot()
    }

    /// Opens the next round. Only allowed once the current one is terminal.
    pub fn create_round(&self) -> Result<u64> {
        let mut state = self.state.lock();
        if !state.round.status().is_terminal() {
            return Err(JackpotError::invalid_state(format!(
                "Round {} is still {}",
                state.round.id(),
                state.round.status()
            )));
        }
        self.open_next_round(&mut state, Utc::now())
    }

    pub fn record_deposit(&self, participant_id: &str, items: &[DepositItem]) -> Result<DepositReceipt> {
        self.record_deposit_at(participant_id, items, Utc::now())
    }

    /// Applies a deposit to the open round. The first accepted deposit of a
    /// pending round activates it and arms the countdown.
    pub fn record_deposit_at(
        &self,
        participant_id: &str,
        items: &[DepositItem],
        now: DateTime<Utc>,
    ) -> Result<DepositReceipt> {
        let mut state = self.state.lock();
        self.deposit_locked(&mut state, None, participant_id, items, now)
    }

    /// Boundary entry point: never fails, rejections carry a reason code.
    pub fn submit(&self, request: &DepositRequest) -> DepositResponse {
        let mut state = self.state.lock();
        self.deposit_locked(
            &mut state,
            request.round_id,
            &request.participant_id,
            &request.items,
            Utc::now(),
        )
        .into()
    }

    /// Advances the round clock. Driven by an external scheduler.
    pub fn on_tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let mut state = self.state.lock();

        match state.round.status() {
            RoundStatus::Pending | RoundStatus::Rolling => Ok(TickOutcome::Waiting),
            RoundStatus::Active => {
                let time_left = state.round.update_time_left(now);
                if time_left > 0 {
                    return Ok(TickOutcome::Counting { time_left });
                }
                if state.round.total_tickets() == 0 {
                    tracing::warn!(
                        "Round {} timer expired without tickets, not rolling",
                        state.round.id()
                    );
                    return Ok(TickOutcome::Stalled);
                }
                self.roll_locked(&mut state, now).map(TickOutcome::Rolled)
            }
            RoundStatus::Completed | RoundStatus::Error => match state.next_round_at {
                Some(at) if now < at => Ok(TickOutcome::Intermission {
                    round_id: state.round.id(),
                    opens_in: ceil_secs(at - now),
                }),
                _ => {
                    let round_id = self.open_next_round(&mut state, now)?;
                    Ok(TickOutcome::NewRound { round_id })
                }
            },
        }
    }

    /// Closes deposits and draws the winner.
    pub fn start_rolling(&self) -> Result<Settlement> {
        let mut state = self.state.lock();
        self.roll_locked(&mut state, Utc::now())
    }

    /// Aborts the open round; its items are handed to the refund handler.
    pub fn fail_round(&self, reason: &str) -> Result<()> {
        let mut state = self.state.lock();
        self.fail_locked(&mut state, reason, Utc::now())
    }

    /// A terminal round still held in memory.
    pub fn archived_round(&self, round_id: u64) -> Option<RoundRecord> {
        self.archive
            .read()
            .iter()
            .find(|record| record.round_id == round_id)
            .cloned()
    }

    /// Terminal rounds held in memory, newest first.
    pub fn recent_rounds(&self) -> Vec<RoundRecord> {
        self.archive.read().iter().cloned().collect()
    }

    /// Verifies a round from the in-memory archive. Rounds older than the
    /// last `archive_capacity` are only in storage and give `RoundNotFound`
    /// here; load them with `RoundStore::load_round` and use `verify_record`.
    pub fn verify_round(
        &self,
        round_id: u64,
        server_seed: &str,
        client_seed: &str,
    ) -> Result<RoundVerification> {
        if let Some(record) = self.archived_round(round_id) {
            return verify_record(&record, server_seed, client_seed);
        }
        if self.current_round_id() == round_id {
            return Err(JackpotError::invalid_state(format!(
                "Round {} has not been drawn yet",
                round_id
            )));
        }
        Err(JackpotError::RoundNotFound(round_id))
    }

    fn deposit_locked(
        &self,
        state: &mut EngineState,
        round_id: Option<u64>,
        participant_id: &str,
        items: &[DepositItem],
        now: DateTime<Utc>,
    ) -> Result<DepositReceipt> {
        let round = &mut state.round;

        if let Some(target) = round_id {
            if target != round.id() {
                return Err(JackpotError::invalid_state(format!(
                    "Deposit targets round {} but round {} is open",
                    target,
                    round.id()
                )));
            }
        }

        let receipt = match self.processor.apply(round, participant_id, items) {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::debug!(
                    "Rejected deposit from {} into round {}: {}",
                    participant_id,
                    round.id(),
                    e
                );
                return Err(e);
            }
        };

        if round.status() == RoundStatus::Pending {
            round.activate(now, self.config.round_duration_secs)?;
            tracing::info!(
                "Round {} active, countdown armed for {}s",
                round.id(),
                self.config.round_duration_secs
            );
        }

        tracing::debug!(
            "Round {}: {} deposited {} ({} tickets), round total {}",
            receipt.round_id,
            receipt.participant_id,
            receipt.deposit_value,
            receipt.tickets_added,
            receipt.round_total_value
        );

        self.send(Dispatch::Publish(RoundEvent::ParticipantUpdated {
            round_id: receipt.round_id,
            participant_id: receipt.participant_id.clone(),
            deposit_value: receipt.deposit_value,
            cumulative_value: receipt.participant_value,
            tickets: receipt.participant_tickets,
            round_total_value: receipt.round_total_value,
        }));

        Ok(receipt)
    }

    fn roll_locked(&self, state: &mut EngineState, now: DateTime<Utc>) -> Result<Settlement> {
        if let Err(e) = state.round.begin_rolling() {
            if matches!(e, JackpotError::Selection(_)) {
                tracing::error!("Refusing to roll round {}: {}", state.round.id(), e);
            }
            return Err(e);
        }

        let round_id = state.round.id();
        tracing::info!(
            "Round {} rolling with {} tickets worth {}",
            round_id,
            state.round.total_tickets(),
            state.round.total_value()
        );
        self.send(Dispatch::Publish(RoundEvent::RoundRolling { round_id }));

        match state.round.settle(now) {
            Ok(settlement) => {
                tracing::info!(
                    "Round {} won by {} with ticket {} of {}",
                    round_id,
                    settlement.winner,
                    settlement.winning_ticket,
                    settlement.total_tickets
                );
                self.send(Dispatch::Publish(RoundEvent::RoundWinner {
                    round_id,
                    winner: settlement.winner.clone(),
                    winning_ticket: settlement.winning_ticket,
                    server_seed: settlement.server_seed.clone(),
                    provable_hash: settlement.provable_hash.clone(),
                }));
                self.send(Dispatch::Publish(RoundEvent::RoundCompleted { round_id }));
                self.close_locked(state, now);
                Ok(settlement)
            }
            Err(e) => {
                tracing::error!(
                    "OPERATOR ALERT: round {} could not be settled: {}",
                    round_id,
                    e
                );
                self.fail_locked(state, &e.to_string(), now)?;
                Err(e)
            }
        }
    }

    fn fail_locked(&self, state: &mut EngineState, reason: &str, now: DateTime<Utc>) -> Result<()> {
        let reason = if reason.trim().is_empty() {
            "unspecified"
        } else {
            reason
        };

        state.round.fail(reason, now)?;

        let round_id = state.round.id();
        let asset_ids: Vec<String> = state
            .round
            .items()
            .iter()
            .map(|item| item.asset_id.clone())
            .collect();

        tracing::error!(
            "Round {} failed: {} ({} item(s) to refund)",
            round_id,
            reason,
            asset_ids.len()
        );

        self.send(Dispatch::Publish(RoundEvent::RoundError {
            round_id,
            reason: reason.to_string(),
        }));
        if !asset_ids.is_empty() {
            self.send(Dispatch::Refund {
                round_id,
                asset_ids,
            });
        }

        self.close_locked(state, now);
        Ok(())
    }

    /// Archives a terminal round and schedules its successor.
    fn close_locked(&self, state: &mut EngineState, now: DateTime<Utc>) {
        let record = state.round.to_record();
        self.send(Dispatch::Persist(record.clone()));

        {
            let mut archive = self.archive.write();
            archive.push_front(record);
            archive.truncate(self.config.archive_capacity.max(1));
        }

        state.next_round_at = Some(now + Duration::seconds(self.config.intermission_secs as i64));
    }

    fn open_next_round(&self, state: &mut EngineState, now: DateTime<Utc>) -> Result<u64> {
        let round_id = state.next_round_id;
        state.round = build_round(&self.config, round_id, now)?;
        state.next_round_id += 1;
        state.next_round_at = None;

        self.announce_round(&state.round);
        Ok(round_id)
    }

    fn announce_round(&self, round: &Round) {
        tracing::info!(
            "Round {} created, server seed hash {}",
            round.id(),
            round.server_seed_hash()
        );
        self.send(Dispatch::Publish(RoundEvent::RoundCreated {
            round_id: round.id(),
            server_seed_hash: round.server_seed_hash().to_string(),
            client_seed: round.client_seed().to_string(),
        }));
    }

    fn send(&self, dispatch: Dispatch) {
        if self.dispatch.send(dispatch).is_err() {
            tracing::warn!("Dispatch queue closed, side effect dropped");
        }
    }

    #[cfg(test)]
    pub(crate) fn with_round<T>(&self, f: impl FnOnce(&mut Round) -> T) -> T {
        f(&mut self.state.lock().round)
    }
}

/// Whole seconds remaining, rounded up.
fn ceil_secs(remaining: Duration) -> i64 {
    (remaining.num_milliseconds() + 999).div_euclid(1000).max(0)
}

fn build_round(config: &EngineConfig, round_id: u64, now: DateTime<Utc>) -> Result<Round> {
    let client_seed = config
        .client_seed
        .clone()
        .unwrap_or_else(|| format!("jackpot-round-{}", round_id));
    let commitment = SeedCommitment::create(client_seed)?;

    Ok(Round::new(
        round_id,
        commitment,
        config.ticket_unit,
        config.round_duration_secs,
        now,
    ))
}
