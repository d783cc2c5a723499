use super::open_storage;
use crate::config::CliConfig;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use comfy_table::{presets::UTF8_FULL, Table};
use jackpot_core::Amount;
use jackpot_engine::{
    open_engine, BroadcastPublisher, DepositItem, RoundLifecycleManager, Settlement, TickOutcome,
};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Upper bound on ticks per round, in case a round never expires.
const MAX_TICKS: u32 = 10_000;

pub async fn simulate(
    settings: &CliConfig,
    rounds: u32,
    players: usize,
    tick_secs: i64,
    print_events: bool,
) -> anyhow::Result<()> {
    if tick_secs <= 0 {
        anyhow::bail!("Tick length must be positive");
    }

    let config = settings.engine_config()?;
    let players = players.clamp(1, config.max_participants);
    let storage = open_storage(settings).await?;

    let publisher = Arc::new(BroadcastPublisher::new(1024));
    let mut events = publisher.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if print_events => {
                    if let Ok(json) = event.to_json() {
                        println!("  event {}", json);
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let (manager, dispatcher) = open_engine(config, storage, publisher)
        .await
        .context("Failed to start the round engine")?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Round",
        "Players",
        "Pot",
        "Tickets",
        "Winning ticket",
        "Winner",
        "Chance",
    ]);

    let mut clock = Utc::now();
    for _ in 0..rounds {
        let round_id = manager.current_round_id();
        deposit_randomly(&manager, players, clock);

        let settlement = run_clock(&manager, &mut clock, tick_secs)?;
        let chance = manager
            .snapshot()
            .participants
            .iter()
            .find(|p| p.participant_id == settlement.winner)
            .map(|p| p.percentage)
            .unwrap_or_default();

        table.add_row(vec![
            round_id.to_string(),
            players.to_string(),
            settlement.total_value.to_string(),
            settlement.total_tickets.to_string(),
            settlement.winning_ticket.to_string(),
            settlement.winner.clone(),
            format!("{:.2}%", chance),
        ]);

        open_next(&manager, &mut clock, tick_secs)?;
    }

    println!("{}", table);
    println!("Verify any round with: jackpot show <round> then jackpot verify <round> <server-seed> <client-seed>");

    // dropping the manager closes the dispatch queue once history is written
    drop(manager);
    dispatcher.await.context("Dispatcher task failed")?;
    let _ = printer.await;

    Ok(())
}

fn deposit_randomly(
    manager: &RoundLifecycleManager,
    players: usize,
    now: DateTime<Utc>,
) {
    let mut rng = rand::thread_rng();
    let round_id = manager.current_round_id();
    let per_deposit = manager.config().max_items_per_deposit.min(3);

    for player in 1..=players {
        let count = rng.gen_range(1..=per_deposit);
        let items: Vec<DepositItem> = (0..count)
            .map(|n| {
                DepositItem::new(
                    format!("r{}-p{}-item{}", round_id, player, n),
                    Amount::from_minor(rng.gen_range(10..=5_000)),
                )
            })
            .collect();

        let participant = format!("player-{}", player);
        match manager.record_deposit_at(&participant, &items, now) {
            Ok(receipt) => tracing::debug!(
                "{} deposited {} for {} tickets",
                participant,
                receipt.deposit_value,
                receipt.tickets_added
            ),
            Err(e) => println!("Deposit from {} rejected: {} ({})", participant, e, e.reason()),
        }
    }
}

fn run_clock(
    manager: &RoundLifecycleManager,
    clock: &mut DateTime<Utc>,
    tick_secs: i64,
) -> anyhow::Result<Settlement> {
    for _ in 0..MAX_TICKS {
        *clock += Duration::seconds(tick_secs);
        match manager.on_tick(*clock)? {
            TickOutcome::Rolled(settlement) => return Ok(settlement),
            TickOutcome::Stalled => anyhow::bail!("Round has no tickets to draw from"),
            _ => {}
        }
    }
    anyhow::bail!("Round did not close after {} ticks", MAX_TICKS)
}

fn open_next(
    manager: &RoundLifecycleManager,
    clock: &mut DateTime<Utc>,
    tick_secs: i64,
) -> anyhow::Result<()> {
    for _ in 0..MAX_TICKS {
        *clock += Duration::seconds(tick_secs);
        if let TickOutcome::NewRound { .. } = manager.on_tick(*clock)? {
            return Ok(());
        }
    }
    anyhow::bail!("Next round did not open after {} ticks", MAX_TICKS)
}
