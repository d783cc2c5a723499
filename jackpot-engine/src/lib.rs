//! Provably fair jackpot round engine
//!
//! Participants deposit valued items into a shared pot and receive tickets in
//! proportion to value. Each round commits to a hashed server seed up front;
//! once deposits close the seed is revealed and, combined with the client
//! seed, picks the winning ticket. Anyone holding both seeds can recompute it.

pub mod api;
pub mod commitment;
pub mod deposit;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod round;
pub mod scheduler;
pub mod selector;
pub mod sinks;

pub use api::{verify_record, DepositRequest, DepositResponse, RoundVerification, VerifyRequest};
pub use commitment::{CommitmentScheme, SeedCommitment, SeedVerification, Sha256Hex};
pub use deposit::{DepositItem, DepositProcessor, DepositReceipt};
pub use dispatch::{
    dispatch_channel, Dispatch, DispatchReceiver, DispatchSender, Dispatcher, EventPublisher,
    RefundHandler, RetryPolicy, RoundArchive,
};
pub use error::{ErrorCategory, JackpotError, Limit, Result};
pub use events::RoundEvent;
pub use ledger::{Participant, TicketLedger};
pub use lifecycle::{RoundLifecycleManager, TickOutcome};
pub use round::{Item, ParticipantView, Round, RoundSnapshot, Settlement};
pub use scheduler::run_ticker;
pub use selector::{select_winner, ticket_ranges, TicketRange};
pub use sinks::{BroadcastPublisher, LogPublisher, SqliteArchive, SqliteRefunds};

use jackpot_core::{EngineConfig, RoundStore, Storage};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Starts an engine backed by `storage`, continuing the round numbering found
/// there. Returns the manager and the dispatcher task, which finishes once the
/// manager is dropped.
pub async fn open_engine(
    config: EngineConfig,
    storage: Arc<Storage>,
    publisher: Arc<dyn EventPublisher>,
) -> Result<(Arc<RoundLifecycleManager>, JoinHandle<()>)> {
    let next_round_id = RoundStore::new(&storage)
        .last_round_id()
        .await?
        .map_or(1, |id| id + 1);

    let (tx, rx) = dispatch_channel();
    let dispatcher = Dispatcher::new(
        publisher,
        Arc::new(SqliteArchive::new(storage.clone())),
        Arc::new(SqliteRefunds::new(storage)),
    );
    let handle = dispatcher.spawn(rx);

    let manager = RoundLifecycleManager::new(config, tx, next_round_id)?;
    tracing::info!("Jackpot engine ready at round {}", next_round_id);

    Ok((Arc::new(manager), handle))
}
