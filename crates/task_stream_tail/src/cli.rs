use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use task_stream::StreamConfig;
use task_stream_http::HttpConfig;

/// Follow the live event feed of one task and print each event as a JSON line.
#[derive(Debug, Parser)]
#[command(name = "task-stream-tail", version)]
pub struct Cli {
    /// Task whose events to follow.
    pub task_id: String,

    /// JSON file with client options (`reconnectDelay`, `gapDetection`, ...).
    /// Flags given on the command line take precedence.
    #[arg(long, env = "TASK_STREAM_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "TASK_STREAM_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token for both endpoints.
    #[arg(long, env = "TASK_STREAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Only events with a greater seq are delivered.
    #[arg(long)]
    pub since_seq: Option<u64>,

    #[arg(long, env = "TASK_STREAM_BATCH_SIZE")]
    pub batch_size: Option<u32>,

    #[arg(long, value_name = "MS")]
    pub flush_interval_ms: Option<u64>,

    #[arg(long, value_name = "MS", env = "TASK_STREAM_RECONNECT_DELAY_MS")]
    pub reconnect_delay_ms: Option<u64>,

    #[arg(long, value_name = "MS", env = "TASK_STREAM_MAX_RECONNECT_DELAY_MS")]
    pub max_reconnect_delay_ms: Option<u64>,

    #[arg(long, env = "TASK_STREAM_RECONNECT_BACKOFF")]
    pub reconnect_backoff: Option<f64>,

    #[arg(long, env = "TASK_STREAM_MAX_RECONNECT_ATTEMPTS")]
    pub max_reconnect_attempts: Option<u32>,

    #[arg(long)]
    pub recovery_page_size: Option<u32>,

    /// Give up after the first transport failure.
    #[arg(long)]
    pub no_reconnect: bool,

    /// Deliver events exactly as received, without gap recovery.
    #[arg(long)]
    pub no_gap_detection: bool,

    /// Log delivery counters on exit.
    #[arg(long)]
    pub stats: bool,
}

impl Cli {
    /// Resolve the client configuration: defaults, then the config file, then
    /// flags and environment.
    pub fn stream_config(&self) -> Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => StreamConfig::default(),
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(since_seq) = self.since_seq {
            config.since_seq = since_seq;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(ms) = self.flush_interval_ms {
            config.flush_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_reconnect_delay_ms {
            config.max_reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = self.reconnect_backoff {
            config.reconnect_backoff = multiplier;
        }
        if let Some(attempts) = self.max_reconnect_attempts {
            config.max_reconnect_attempts = attempts;
        }
        if let Some(page_size) = self.recovery_page_size {
            config.recovery_page_size = page_size;
        }
        if self.no_reconnect {
            config.auto_reconnect = false;
        }
        if self.no_gap_detection {
            config.gap_detection = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn http_config(&self, config: &StreamConfig) -> HttpConfig {
        let http = HttpConfig::from_stream_config(config);
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => http.with_access_token(token),
            _ => http,
        }
    }
}

fn load_config_file(path: &Path) -> Result<StreamConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}
