use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::kernel::retry::RetryPolicy;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub nats_url: String,
    /// Max attempts for serializable transactions (including the first).
    pub tx_max_attempts: u32,
    /// Initial backoff between conflict retries, doubled per attempt.
    pub tx_backoff_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            nats_url: env::var("NATS_URL")
                .unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            tx_max_attempts: env::var("TX_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("TX_MAX_ATTEMPTS must be a valid number")?,
            tx_backoff_ms: env::var("TX_BACKOFF_MS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("TX_BACKOFF_MS must be a valid number")?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.tx_max_attempts,
            initial_backoff: Duration::from_millis(self.tx_backoff_ms),
        }
    }
}
