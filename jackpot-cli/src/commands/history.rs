use super::open_storage;
use crate::config::CliConfig;
use anyhow::Context;
use comfy_table::{presets::UTF8_FULL, Table};
use jackpot_core::RoundStore;
use jackpot_engine::ticket_ranges;
use jackpot_engine::Participant;

pub async fn show_history(settings: &CliConfig, page: u32, per_page: u32) -> anyhow::Result<()> {
    let storage = open_storage(settings).await?;
    let rounds = RoundStore::new(&storage)
        .list_rounds(page, per_page)
        .await
        .context("Failed to list rounds")?;

    if rounds.items.is_empty() {
        println!("No rounds recorded");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Round",
        "Status",
        "Closed",
        "Pot",
        "Tickets",
        "Winner",
        "Winning ticket",
    ]);

    for record in &rounds.items {
        table.add_row(vec![
            record.round_id.to_string(),
            record.status.to_string(),
            record.closed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.total_value.to_string(),
            record.total_tickets.to_string(),
            record.winner.clone().unwrap_or_else(|| "-".to_string()),
            record
                .winning_ticket
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    println!(
        "Page {} of {} ({} rounds)",
        rounds.page,
        rounds.total_pages(),
        rounds.total
    );

    Ok(())
}

pub async fn show_round(settings: &CliConfig, round_id: u64, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(settings).await?;
    let record = RoundStore::new(&storage).load_round(round_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("Round {} ({})", record.round_id, record.status);
    println!("  Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Closed: {}", record.closed_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Pot: {} ({} tickets)", record.total_value, record.total_tickets);
    println!("  Server seed hash: {}", record.server_seed_hash);
    println!("  Client seed: {}", record.client_seed);
    if let Some(seed) = &record.server_seed {
        println!("  Server seed: {}", seed);
    }
    if let Some(hash) = &record.provable_hash {
        println!("  Provable hash: {}", hash);
    }
    if let (Some(winner), Some(ticket)) = (&record.winner, record.winning_ticket) {
        println!("  Winner: {} (ticket {})", winner, ticket);
    }
    if let Some(reason) = &record.error_reason {
        println!("  Error: {}", reason);
    }

    if !record.participants.is_empty() {
        let participants: Vec<Participant> =
            record.participants.iter().map(Participant::from).collect();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Participant", "Value", "Tickets", "Range"]);
        let ranges = ticket_ranges(&participants)?;
        for (p, range) in participants.iter().zip(ranges) {
            table.add_row(vec![
                p.id().to_string(),
                p.items_value().to_string(),
                p.tickets().to_string(),
                format!("[{}, {})", range.start, range.end),
            ]);
        }
        println!("{}", table);
    }

    Ok(())
}
