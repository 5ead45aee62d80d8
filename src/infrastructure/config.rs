//! Configuration infrastructure
//!
//! Loads the immutable per-run configuration: dashboard credentials, the
//! Telegram bot/channel pair, polling cadence and the audio work directory.
//! Values come from a config file with `CALLWATCH_*` environment overrides
//! and are never mutated after startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Default values used when the config file omits a field.
pub mod defaults {
    /// Seconds slept between two poll ticks.
    pub const TICK_SECONDS: u64 = 5;
    /// Minutes between two full page refreshes.
    pub const REFRESH_INTERVAL_MINUTES: u64 = 10;
    /// Back-off after an unexpected mid-tick error, in seconds.
    pub const ERROR_BACKOFF_SECONDS: u64 = 30;
    /// Delay before a detected call's audio pipeline starts, giving the
    /// dashboard time to finish writing the recording.
    pub const PIPELINE_DELAY_SECONDS: u64 = 20;
    /// Login attempts before giving up for good.
    pub const LOGIN_MAX_RETRIES: u32 = 3;
    /// Bounded timeout for HTTP requests (page fetch, recording fetch,
    /// attachment send), in seconds.
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    /// Generic user agent presented to the dashboard.
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    /// Default log level.
    pub const LOG_LEVEL: &str = "info";
    /// Where temporary recording artifacts are written.
    pub const AUDIO_WORK_DIR: &str = ".";
}

/// Complete application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Target dashboard and credentials.
    pub dashboard: DashboardConfig,

    /// Notification transport settings.
    pub telegram: TelegramConfig,

    /// Polling cadence and pipeline timing.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Audio pipeline settings.
    #[serde(default)]
    pub audio: AudioConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard endpoint and credential pair.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the carrier dashboard, e.g. `https://panel.example.com`.
    pub base_url: String,

    /// Identity used on the login form.
    pub username: String,

    /// Secret used on the login form.
    pub password: String,

    /// User agent string for every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Login attempts before the process gives up.
    #[serde(default = "default_login_retries")]
    pub login_max_retries: u32,
}

impl DashboardConfig {
    pub fn login_url(&self) -> String {
        format!("{}/login", self.base_url.trim_end_matches('/'))
    }

    pub fn live_calls_url(&self) -> String {
        format!("{}/live/calls", self.base_url.trim_end_matches('/'))
    }

    /// Host of the target dashboard, used to confirm post-login navigation
    /// stayed on the expected domain.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Inline link button attached to audio deliveries.
#[derive(Debug, Clone, Deserialize)]
pub struct PromoButton {
    /// Visible button label.
    pub label: String,
    /// Link the button opens.
    pub url: String,
}

/// Telegram bot and channel identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,

    /// Chat/channel that receives the notifications.
    pub chat_id: i64,

    /// Promotional buttons shown under audio deliveries (typically two).
    #[serde(default)]
    pub promo_buttons: Vec<PromoButton>,
}

/// Polling cadence and pipeline timing.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Seconds slept between two scans of the live-calls table.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// Minutes between two full page refreshes, independent of the tick.
    #[serde(default = "default_refresh_minutes")]
    pub refresh_interval_minutes: u64,

    /// Back-off after an unexpected mid-tick error, in seconds.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_seconds: u64,

    /// Delay before a detected call's audio pipeline starts, in seconds.
    #[serde(default = "default_pipeline_delay")]
    pub pipeline_delay_seconds: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: defaults::TICK_SECONDS,
            refresh_interval_minutes: defaults::REFRESH_INTERVAL_MINUTES,
            error_backoff_seconds: defaults::ERROR_BACKOFF_SECONDS,
            pipeline_delay_seconds: defaults::PIPELINE_DELAY_SECONDS,
        }
    }
}

/// Audio pipeline settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Directory for the two transient per-call artifacts (raw + mp3).
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            work_dir: defaults::AUDIO_WORK_DIR.to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable daily-rolling file output in addition to the console.
    #[serde(default)]
    pub file_output: bool,

    /// Directory for log files when file output is enabled.
    #[serde(default = "default_log_dir")]
    pub dir: String,

    /// Module-specific log level filters (e.g. "reqwest": "warn").
    #[serde(default)]
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            file_output: false,
            dir: default_log_dir(),
            module_filters: HashMap::new(),
        }
    }
}

fn default_user_agent() -> String {
    defaults::USER_AGENT.to_string()
}
fn default_request_timeout() -> u64 {
    defaults::REQUEST_TIMEOUT_SECONDS
}
fn default_login_retries() -> u32 {
    defaults::LOGIN_MAX_RETRIES
}
fn default_tick_seconds() -> u64 {
    defaults::TICK_SECONDS
}
fn default_refresh_minutes() -> u64 {
    defaults::REFRESH_INTERVAL_MINUTES
}
fn default_error_backoff() -> u64 {
    defaults::ERROR_BACKOFF_SECONDS
}
fn default_pipeline_delay() -> u64 {
    defaults::PIPELINE_DELAY_SECONDS
}
fn default_work_dir() -> String {
    defaults::AUDIO_WORK_DIR.to_string()
}
fn default_log_level() -> String {
    defaults::LOG_LEVEL.to_string()
}
fn default_log_dir() -> String {
    "logs".to_string()
}

impl AppConfig {
    /// Load configuration from the given file (any format the `config`
    /// crate understands), then apply `CALLWATCH_*` environment overrides
    /// (`__` as section separator, e.g. `CALLWATCH_TELEGRAM__BOT_TOKEN`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CALLWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to assemble configuration sources")?;

        settings
            .try_deserialize()
            .context("configuration is missing required fields or has invalid values")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> AppConfig {
        let raw = r#"
            [dashboard]
            base_url = "https://panel.example.com"
            username = "ops@example.com"
            password = "secret"

            [telegram]
            bot_token = "123:abc"
            chat_id = -1001234
        "#;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap();
        settings.try_deserialize().unwrap()
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let cfg = minimal();
        assert_eq!(cfg.poller.tick_seconds, defaults::TICK_SECONDS);
        assert_eq!(
            cfg.poller.pipeline_delay_seconds,
            defaults::PIPELINE_DELAY_SECONDS
        );
        assert_eq!(cfg.audio.work_dir, defaults::AUDIO_WORK_DIR);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.telegram.promo_buttons.is_empty());
    }

    #[test]
    fn dashboard_urls_are_derived_from_base() {
        let cfg = minimal();
        assert_eq!(cfg.dashboard.login_url(), "https://panel.example.com/login");
        assert_eq!(
            cfg.dashboard.live_calls_url(),
            "https://panel.example.com/live/calls"
        );
        assert_eq!(cfg.dashboard.host().as_deref(), Some("panel.example.com"));
    }
}
