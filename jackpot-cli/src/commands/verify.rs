use super::open_storage;
use crate::config::CliConfig;
use jackpot_core::RoundStore;
use jackpot_engine::{commitment, verify_record};

pub async fn verify_round(
    settings: &CliConfig,
    round_id: u64,
    server_seed: &str,
    client_seed: &str,
) -> anyhow::Result<()> {
    let storage = open_storage(settings).await?;
    let record = RoundStore::new(&storage).load_round(round_id).await?;
    let result = verify_record(&record, server_seed, client_seed)?;

    println!("Round {}", round_id);
    println!("  Seed matches commitment: {}", yes_no(result.hash_matches));
    println!("  Client seed matches: {}", yes_no(result.client_seed_matches));
    println!("  Provable hash: {}", result.provable_hash);
    println!(
        "  Winning ticket: {} (recorded {})",
        show(result.recomputed_winning_ticket),
        show(record.winning_ticket)
    );
    println!(
        "  Winner: {} (recorded {})",
        show(result.recomputed_winner.as_deref()),
        show(record.winner.as_deref())
    );

    if !result.verified {
        anyhow::bail!("Round {} failed verification", round_id);
    }
    println!("Round {} verified", round_id);

    Ok(())
}

pub fn check_seeds(
    server_seed: &str,
    client_seed: &str,
    hash: &str,
    total_tickets: u64,
    winning_ticket: u64,
) -> anyhow::Result<()> {
    let result = commitment::verify(server_seed, client_seed, total_tickets, hash, winning_ticket);

    println!("  Seed matches commitment: {}", yes_no(result.hash_matches));
    println!("  Provable hash: {}", result.provable_hash);
    println!(
        "  Winning ticket: {} (expected {})",
        show(result.recomputed_winning_ticket),
        winning_ticket
    );

    if !result.verified {
        anyhow::bail!("Seeds do not reproduce the claimed outcome");
    }
    println!("Outcome verified");

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "NO"
    }
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
