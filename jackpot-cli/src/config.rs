use anyhow::Context;
use jackpot_core::EngineConfig;
use std::path::PathBuf;

const DB_FILE: &str = "jackpot.db";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("jackpot"),
            config_path: None,
        }
    }
}

impl CliConfig {
    pub fn resolve(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: data_dir.unwrap_or(defaults.data_dir),
            config_path,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    /// Explicit `--config`, else `config.json` in the data dir, else defaults.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => {
                let fallback = self.data_dir.join(CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(EngineConfig::default());
                }
                fallback
            }
        };

        EngineConfig::load(&path)
            .with_context(|| format!("Failed to load engine config from {}", path.display()))
    }
}
