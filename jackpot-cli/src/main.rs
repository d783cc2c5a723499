mod commands;
mod config;

use clap::{Parser, Subcommand};
use jackpot_core::CoreError;
use jackpot_engine::JackpotError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jackpot")]
#[command(about = "Provably fair jackpot round engine")]
#[command(version)]
struct Cli {
    /// Data directory for the round history database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run rounds with random participants on an accelerated clock
    Simulate {
        /// Number of rounds to play
        #[arg(short, long, default_value_t = 3)]
        rounds: u32,
        /// Participants per round
        #[arg(short, long, default_value_t = 4)]
        players: usize,
        /// Simulated seconds per tick
        #[arg(long, default_value_t = 5)]
        tick_secs: i64,
        /// Print every round event as JSON
        #[arg(long)]
        events: bool,
    },
    /// List finished rounds, newest first
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        per_page: u32,
    },
    /// Show one finished round
    Show {
        round_id: u64,
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-derive a recorded round's winner from its seeds
    Verify {
        round_id: u64,
        server_seed: String,
        client_seed: String,
    },
    /// Check a seed pair against a commitment without any stored data
    Check {
        server_seed: String,
        client_seed: String,
        /// Published server seed hash
        #[arg(long)]
        hash: String,
        #[arg(long)]
        total_tickets: u64,
        #[arg(long)]
        winning_ticket: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "jackpot={},jackpot_engine={},jackpot_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = config::CliConfig::resolve(cli.data_dir, cli.config);

    let result = match cli.command {
        Commands::Simulate {
            rounds,
            players,
            tick_secs,
            events,
        } => commands::simulate(&settings, rounds, players, tick_secs, events).await,
        Commands::History { page, per_page } => {
            commands::show_history(&settings, page, per_page).await
        }
        Commands::Show { round_id, json } => commands::show_round(&settings, round_id, json).await,
        Commands::Verify {
            round_id,
            server_seed,
            client_seed,
        } => commands::verify_round(&settings, round_id, &server_seed, &client_seed).await,
        Commands::Check {
            server_seed,
            client_seed,
            hash,
            total_tickets,
            winning_ticket,
        } => commands::check_seeds(
            &server_seed,
            &client_seed,
            &hash,
            total_tickets,
            winning_ticket,
        ),
    };

    if let Err(e) = result {
        if let Some(CoreError::RoundNotFound { round_id }) = e.downcast_ref::<CoreError>() {
            eprintln!("Error: Round {} not found", round_id);
            eprintln!("Use 'jackpot history' to see recorded rounds");
        } else if let Some(CoreError::Config(msg)) = e.downcast_ref::<CoreError>() {
            eprintln!("Error: Invalid configuration: {}", msg);
        } else if let Some(err) = e.downcast_ref::<JackpotError>() {
            match err {
                JackpotError::CryptoIntegrity { round_id } => {
                    eprintln!("Error: Seed commitment of round {} does not hold", round_id);
                }
                JackpotError::InvalidState(msg) => {
                    eprintln!("Error: {}", msg);
                }
                _ => {
                    eprintln!("Error [{}]: {:#}", err.reason(), e);
                }
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}
