use std::path::PathBuf;
use std::time::Duration as StdDuration;

use anyhow::Context;

use crate::types::TimeStamp;

pub const DB_PATH_KEY: &str = "CONSENT_ENGINE_DB_PATH";
pub const IDEMPOTENCY_WINDOW_KEY: &str = "CONSENT_ENGINE_IDEMPOTENCY_WINDOW_SECS";
pub const STORE_TIMEOUT_KEY: &str = "CONSENT_ENGINE_STORE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory of the sled database
    pub db_path: PathBuf,
    /// How long a scoped idempotency key is remembered
    pub idempotency_window: chrono::Duration,
    /// Default deadline applied to every persistence call of a request
    pub store_timeout: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./consent-engine.db"),
            idempotency_window: chrono::Duration::hours(24),
            store_timeout: StdDuration::from_millis(5_000),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults for unset keys
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_KEY) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup(IDEMPOTENCY_WINDOW_KEY) {
            let secs: i64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{IDEMPOTENCY_WINDOW_KEY} is not a number: {secs}"))?;
            anyhow::ensure!(secs > 0, "{IDEMPOTENCY_WINDOW_KEY} must be positive");
            let window = chrono::Duration::try_seconds(secs)
                .with_context(|| format!("{IDEMPOTENCY_WINDOW_KEY} is out of range: {secs}"))?;
            anyhow::ensure!(
                TimeStamp::now().plus(window).is_some(),
                "{IDEMPOTENCY_WINDOW_KEY} runs past the representable time range: {secs}"
            );
            config.idempotency_window = window;
        }
        if let Some(ms) = lookup(STORE_TIMEOUT_KEY) {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("{STORE_TIMEOUT_KEY} is not a number: {ms}"))?;
            anyhow::ensure!(ms > 0, "{STORE_TIMEOUT_KEY} must be positive");
            config.store_timeout = StdDuration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn with_idempotency_window(mut self, window: chrono::Duration) -> Self {
        self.idempotency_window = window;
        self
    }

    pub fn with_store_timeout(mut self, timeout: StdDuration) -> Self {
        self.store_timeout = timeout;
        self
    }
}
