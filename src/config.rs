use std::time::Duration;

use anyhow::Context;

/// Reminder sweep period used when `REMINDER_INTERVAL_MS` is unset.
pub const DEFAULT_REMINDER_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub reminder_interval_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse::<u16>().context("APP_PORT must be a port number")?,
            Err(_) => 8080,
        };
        let reminder_interval_ms = match std::env::var("REMINDER_INTERVAL_MS") {
            Ok(v) => v
                .parse::<u64>()
                .context("REMINDER_INTERVAL_MS must be an integer")?,
            Err(_) => DEFAULT_REMINDER_INTERVAL_MS,
        };
        anyhow::ensure!(reminder_interval_ms > 0, "REMINDER_INTERVAL_MS must be > 0");

        Ok(Self {
            host,
            port,
            reminder_interval_ms,
        })
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_millis(self.reminder_interval_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            reminder_interval_ms: DEFAULT_REMINDER_INTERVAL_MS,
        }
    }
}
