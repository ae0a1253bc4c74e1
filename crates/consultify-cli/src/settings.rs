//! Resolve the config file and database the command runs against.

use anyhow::Context;
use consultify_core::config::AppConfig;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub struct Settings {
    config_path: PathBuf,
    db_override: Option<PathBuf>,
}

impl Settings {
    pub fn new(config_path: PathBuf, db_override: Option<PathBuf>) -> Self {
        Self {
            config_path,
            db_override,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Config file (defaults when absent), then environment, then `--db`.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load_or_default(&self.config_path)
            .with_context(|| format!("failed to load config {}", self.config_path.display()))?;
        config.apply_env();
        if let Some(db) = &self.db_override {
            config.database.path = db.display().to_string();
        }
        Ok(config)
    }

    /// Open the configured database with migrations applied.
    pub fn open_db(&self) -> anyhow::Result<(AppConfig, Connection)> {
        let config = self.load_config()?;
        let conn = consultify_core::db::open(&config.database.path)
            .with_context(|| format!("failed to open database {}", config.database.path))?;
        Ok((config, conn))
    }
}
