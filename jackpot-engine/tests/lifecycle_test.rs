use chrono::{Duration, Utc};
use jackpot_core::{Amount, EngineConfig, RefundStore, RoundStatus, RoundStore, Storage};
use jackpot_engine::{
    commitment, dispatch_channel, open_engine, BroadcastPublisher, CommitmentScheme, DepositItem,
    Dispatch, DispatchReceiver, JackpotError, RoundEvent, RoundLifecycleManager, Sha256Hex,
    TickOutcome,
};
use std::sync::Arc;
use std::thread;

fn config() -> EngineConfig {
    EngineConfig {
        round_duration_secs: 60,
        intermission_secs: 10,
        ..Default::default()
    }
}

fn manager_with(config: EngineConfig) -> (RoundLifecycleManager, DispatchReceiver) {
    let (tx, rx) = dispatch_channel();
    (RoundLifecycleManager::new(config, tx, 1).unwrap(), rx)
}

fn item(asset_id: &str, minor: u64) -> DepositItem {
    DepositItem::new(asset_id, Amount::from_minor(minor))
}

fn drain(rx: &mut DispatchReceiver) -> Vec<Dispatch> {
    let mut out = Vec::new();
    while let Ok(dispatch) = rx.try_recv() {
        out.push(dispatch);
    }
    out
}

#[test]
fn test_two_participants_draw_from_their_ranges() {
    let (manager, _rx) = manager_with(config());
    manager.record_deposit("p1", &[item("a", 1)]).unwrap();
    manager.record_deposit("p2", &[item("b", 99)]).unwrap();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.total_tickets, 100);
    assert_eq!(snapshot.participants[0].ticket_end, 1);
    assert_eq!(snapshot.participants[1].ticket_start, 1);

    let settlement = manager.start_rolling().unwrap();
    let expected = if settlement.winning_ticket < 1 { "p1" } else { "p2" };
    assert_eq!(settlement.winner, expected);

    let hash = commitment::provable_hash(&settlement.server_seed, &snapshot.client_seed);
    assert_eq!(hash, settlement.provable_hash);
    assert_eq!(
        commitment::winning_ticket(&hash, 100),
        Some(settlement.winning_ticket)
    );
}

#[test]
fn test_deposit_after_rolling_is_rejected() {
    let (manager, _rx) = manager_with(config());
    manager.record_deposit("p1", &[item("a", 500)]).unwrap();
    manager.start_rolling().unwrap();
    let before = manager.snapshot();

    let err = manager.record_deposit("p2", &[item("b", 500)]).unwrap_err();
    assert!(matches!(err, JackpotError::RoundNotActive { round_id: 1, .. }));

    let after = manager.snapshot();
    assert_eq!(after.total_value, before.total_value);
    assert_eq!(after.total_tickets, before.total_tickets);
    assert_eq!(after.items.len(), 1);
}

#[test]
fn test_concurrent_deposits_are_all_counted() {
    const THREADS: usize = 32;
    const PER_THREAD: usize = 10;

    let (manager, _rx) = manager_with(EngineConfig {
        max_participants: 64,
        max_items: 1000,
        ..config()
    });
    let manager = Arc::new(manager);

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let manager = manager.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let asset = format!("asset-{}-{}", t, i);
                    manager
                        .record_deposit(&format!("p{}", t), &[item(&asset, 250)])
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let snapshot = manager.snapshot();
    let deposits = (THREADS * PER_THREAD) as u64;
    assert_eq!(snapshot.total_value, Amount::from_minor(250 * deposits));
    assert_eq!(snapshot.total_tickets, 250 * deposits);
    assert_eq!(snapshot.items.len(), THREADS * PER_THREAD);
    assert_eq!(snapshot.participants.len(), THREADS);

    let value_sum: Amount = snapshot.participants.iter().map(|p| p.items_value).sum();
    let ticket_sum: u64 = snapshot.participants.iter().map(|p| p.tickets).sum();
    assert_eq!(value_sum, snapshot.total_value);
    assert_eq!(ticket_sum, snapshot.total_tickets);
}

#[test]
fn test_concurrent_roll_and_deposit_never_both_win() {
    for _ in 0..20 {
        let (manager, _rx) = manager_with(config());
        manager.record_deposit("p1", &[item("a", 100)]).unwrap();
        let manager = Arc::new(manager);

        let roller = {
            let manager = manager.clone();
            thread::spawn(move || manager.start_rolling())
        };
        let depositor = {
            let manager = manager.clone();
            thread::spawn(move || manager.record_deposit("p2", &[item("b", 100)]))
        };

        let settlement = roller.join().unwrap().unwrap();
        let deposit = depositor.join().unwrap();

        // either the deposit landed before the draw, or it was turned away
        match deposit {
            Ok(_) => assert_eq!(settlement.total_tickets, 200),
            Err(e) => {
                assert_eq!(e.reason(), "round_not_active");
                assert_eq!(settlement.total_tickets, 100);
            }
        }
    }
}

#[test]
fn test_revealed_seed_matches_commitment() {
    let (manager, _rx) = manager_with(config());
    let committed = manager.snapshot().server_seed_hash;
    manager.record_deposit("p1", &[item("a", 700)]).unwrap();

    let settlement = manager.start_rolling().unwrap();
    assert!(Sha256Hex::verify(&committed, &settlement.server_seed));

    let record = manager.archived_round(1).unwrap();
    assert_eq!(record.status, RoundStatus::Completed);
    assert_eq!(record.server_seed.as_deref(), Some(settlement.server_seed.as_str()));

    let verification = manager
        .verify_round(1, &settlement.server_seed, &record.client_seed)
        .unwrap();
    assert!(verification.verified);
    assert_eq!(verification.recomputed_winner.as_deref(), Some("p1"));
}

#[test]
fn test_tampered_seed_fails_verification() {
    let seed = "5f1d3c2b9a8e7f6d5c4b3a29180706f5e4d3c2b1a09f8e7d6c5b4a3928170605";
    let hash = Sha256Hex::commit(seed);
    let tampered = "5f1d3c2b9a8e7f6d5c4b3a29180706f5e4d3c2b1a09f8e7d6c5b4a3928170604";

    let honest = commitment::verify(seed, "client-30", 100, &hash, 42);
    assert!(honest.verified);

    let forged = commitment::verify(tampered, "client-30", 100, &hash, 42);
    assert!(!forged.hash_matches);
    assert!(!forged.verified);
}

#[test]
fn test_rejected_deposit_does_not_arm_countdown() {
    let (manager, _rx) = manager_with(config());
    let start = Utc::now();

    // a deposit that is rejected must not arm the countdown
    assert!(manager.record_deposit_at("p1", &[], start).is_err());
    assert_eq!(
        manager.on_tick(start + Duration::seconds(120)).unwrap(),
        TickOutcome::Waiting
    );
    assert_eq!(manager.snapshot().status, RoundStatus::Pending);
}

#[test]
fn test_intermission_then_new_round() {
    let (manager, mut rx) = manager_with(config());
    let start = Utc::now();
    manager.record_deposit_at("p1", &[item("a", 100)], start).unwrap();

    let rolled_at = start + Duration::seconds(61);
    assert!(matches!(
        manager.on_tick(rolled_at).unwrap(),
        TickOutcome::Rolled(_)
    ));
    assert!(matches!(
        manager.on_tick(rolled_at + Duration::seconds(5)).unwrap(),
        TickOutcome::Intermission { .. }
    ));
    assert_eq!(
        manager.on_tick(rolled_at + Duration::seconds(10)).unwrap(),
        TickOutcome::NewRound { round_id: 2 }
    );

    let fresh = manager.snapshot();
    assert_eq!(fresh.round_id, 2);
    assert_eq!(fresh.total_tickets, 0);
    assert!(fresh.participants.is_empty());
    assert_eq!(manager.recent_rounds().len(), 1);

    let created: Vec<u64> = drain(&mut rx)
        .into_iter()
        .filter_map(|d| match d {
            Dispatch::Publish(RoundEvent::RoundCreated { round_id, .. }) => Some(round_id),
            _ => None,
        })
        .collect();
    assert_eq!(created, vec![1, 2]);
}

#[test]
fn test_failed_round_refunds_every_item() {
    let (manager, mut rx) = manager_with(config());
    manager.record_deposit("p1", &[item("a", 100), item("b", 50)]).unwrap();
    manager.record_deposit("p2", &[item("c", 10)]).unwrap();

    manager.fail_round("payout service unavailable").unwrap();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.status, RoundStatus::Error);
    assert!(snapshot.winner.is_none());

    let refunds: Vec<Vec<String>> = drain(&mut rx)
        .into_iter()
        .filter_map(|d| match d {
            Dispatch::Refund { asset_ids, .. } => Some(asset_ids),
            _ => None,
        })
        .collect();
    assert_eq!(
        refunds,
        vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
    );
}

#[tokio::test]
async fn test_engine_persists_history() {
    let storage = Arc::new(Storage::in_memory().await.unwrap());
    let publisher = Arc::new(BroadcastPublisher::new(64));
    let mut events = publisher.subscribe();

    let (manager, dispatcher) = open_engine(config(), storage.clone(), publisher)
        .await
        .unwrap();

    manager.record_deposit("p1", &[item("a", 300)]).unwrap();
    manager.start_rolling().unwrap();
    manager.create_round().unwrap();
    manager.record_deposit("p2", &[item("b", 300)]).unwrap();
    manager.fail_round("operator abort").unwrap();

    drop(manager);
    dispatcher.await.unwrap();

    let first = events.recv().await.unwrap();
    assert_eq!(first.kind(), "round_created");

    let rounds = RoundStore::new(&storage);
    assert_eq!(rounds.count_rounds().await.unwrap(), 2);
    assert_eq!(rounds.load_round(1).await.unwrap().winner.as_deref(), Some("p1"));

    let failed = rounds.load_round(2).await.unwrap();
    assert_eq!(failed.status, RoundStatus::Error);
    assert!(failed.server_seed.is_none());

    let refunded = RefundStore::new(&storage).list_refunds(2).await.unwrap();
    assert_eq!(refunded, vec!["b".to_string()]);
}

#[tokio::test]
async fn test_engine_continues_round_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("jackpot.db");

    {
        let storage = Arc::new(Storage::new(&db_path).await.unwrap());
        let (manager, dispatcher) =
            open_engine(config(), storage, Arc::new(BroadcastPublisher::new(8)))
                .await
                .unwrap();
        manager.record_deposit("p1", &[item("a", 100)]).unwrap();
        manager.start_rolling().unwrap();
        drop(manager);
        dispatcher.await.unwrap();
    }

    let storage = Arc::new(Storage::new(&db_path).await.unwrap());
    let (manager, _dispatcher) =
        open_engine(config(), storage, Arc::new(BroadcastPublisher::new(8)))
            .await
            .unwrap();
    assert_eq!(manager.current_round_id(), 2);
}
