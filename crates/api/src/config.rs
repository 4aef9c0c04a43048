use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

use crate::game::TiePolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// `None` runs against the in-process store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    /// Applies to every route except `/process`, which is bounded per tournament instead.
    pub request_timeout: Duration,
    pub admin_api_key: Option<String>,
    pub server_api_key: Option<String>,
    pub scheduler_interval: Duration,
    pub scheduler_concurrency: usize,
    pub operation_timeout: Duration,
    pub tie_policy: TiePolicy,
    pub reminder_window_minutes: i64,
    pub reminder_interval: Duration,
    pub notify_concurrency: usize,
    pub http_timeout: Duration,
    pub frame_base_url: String,
    pub feed_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 30,
            port: 8080,
            request_timeout: Duration::from_secs(30),
            admin_api_key: None,
            server_api_key: None,
            scheduler_interval: Duration::from_secs(60),
            scheduler_concurrency: 8,
            operation_timeout: Duration::from_secs(30),
            tie_policy: TiePolicy::FirstSeed,
            reminder_window_minutes: 60,
            reminder_interval: Duration::from_secs(60),
            notify_concurrency: 10,
            http_timeout: Duration::from_secs(10),
            frame_base_url: "https://rps-frame.vercel.app/api/game".to_string(),
            feed_base_url: "https://warpcast.com".to_string(),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let tie_policy = match env::var("TIE_POLICY") {
            Ok(value) => value.parse().map_err(|e: String| anyhow!(e))?,
            Err(_) => defaults.tie_policy,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            database_max_connections: parsed(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            port: parsed("PORT", defaults.port),
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT_SECONDS", 30)),
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|v| !v.is_empty()),
            server_api_key: env::var("SERVER_API_KEY").ok().filter(|v| !v.is_empty()),
            scheduler_interval: Duration::from_secs(parsed("SCHEDULER_INTERVAL_SECONDS", 60)),
            scheduler_concurrency: parsed("SCHEDULER_CONCURRENCY", defaults.scheduler_concurrency)
                .max(1),
            operation_timeout: Duration::from_secs(parsed("OPERATION_TIMEOUT_SECONDS", 30)),
            tie_policy,
            reminder_window_minutes: parsed(
                "REMINDER_WINDOW_MINUTES",
                defaults.reminder_window_minutes,
            ),
            reminder_interval: defaults.reminder_interval,
            notify_concurrency: parsed("NOTIFY_CONCURRENCY", defaults.notify_concurrency).max(1),
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECONDS", 10)),
            frame_base_url: env::var("FRAME_BASE_URL").unwrap_or(defaults.frame_base_url),
            feed_base_url: env::var("FEED_BASE_URL").unwrap_or(defaults.feed_base_url),
        })
    }
}
