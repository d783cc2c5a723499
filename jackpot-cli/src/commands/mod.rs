pub mod history;
pub mod simulate;
pub mod verify;

pub use history::{show_history, show_round};
pub use simulate::simulate;
pub use verify::{check_seeds, verify_round};

use crate::config::CliConfig;
use anyhow::Context;
use jackpot_core::Storage;
use std::sync::Arc;

async fn open_storage(settings: &CliConfig) -> anyhow::Result<Arc<Storage>> {
    tokio::fs::create_dir_all(&settings.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.data_dir.display()))?;

    let db_path = settings.db_path();
    let storage = Storage::new(&db_path)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    Ok(Arc::new(storage))
}
