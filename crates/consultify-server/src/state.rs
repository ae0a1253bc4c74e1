use crate::error::AppError;
use consultify_core::config::AppConfig;
use consultify_core::demo::DemoSessionStore;
use consultify_core::ratelimit::SlidingWindowLimiter;
use consultify_core::types::Provider;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared state for all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    pub config: Arc<AppConfig>,
    pub demo: Arc<DemoSessionStore>,
    pub chat_limiter: Arc<SlidingWindowLimiter>,
    /// Provider keys from the process environment, used when a tenant has
    /// no integration config of its own.
    pub env_keys: Arc<HashMap<Provider, String>>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let env_keys = Provider::all()
            .iter()
            .filter_map(|p| {
                std::env::var(p.env_key())
                    .ok()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| (*p, k))
            })
            .collect();
        let state = Self {
            db: Arc::new(Mutex::new(conn)),
            demo: Arc::new(DemoSessionStore::new(chrono::Duration::minutes(
                config.demo.session_ttl_minutes,
            ))),
            chat_limiter: Arc::new(SlidingWindowLimiter::per_minute(
                config.ai.requests_per_minute.max(1),
            )),
            config: Arc::new(config),
            env_keys: Arc::new(env_keys),
        };

        // Guard: only spawn if inside a Tokio runtime (skipped in sync unit tests).
        if tokio::runtime::Handle::try_current().is_ok() {
            let demo = state.demo.clone();
            let limiter = state.chat_limiter.clone();
            let interval = Duration::from_secs(state.config.demo.sweep_interval_secs.max(1));
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    demo.sweep(chrono::Utc::now());
                    limiter.prune(Instant::now());
                }
            });
        }

        state
    }

    /// Replace the environment-derived provider keys.
    pub fn with_env_keys(mut self, keys: HashMap<Provider, String>) -> Self {
        self.env_keys = Arc::new(keys);
        self
    }

    /// Run blocking database work on the blocking pool.
    pub async fn db<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> consultify_core::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            f(&conn)
        })
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
        Ok(result)
    }
}
