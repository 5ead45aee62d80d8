//! Logging system configuration and initialization
//!
//! Builds a tracing subscriber from [`LoggingConfig`]: console output always,
//! plus an optional daily-rolling log file. The non-blocking writer guard is
//! parked in a process-wide static so file logging survives until exit.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::LoggingConfig;

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Assemble the env filter from the configured level plus per-module filters.
/// `RUST_LOG` wins over the config file when set.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);
        for (module, level) in &config.module_filters {
            if let Ok(directive) = format!("{}={}", module, level).parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    })
}

/// Initialize the global tracing subscriber. Call once at startup.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(true);

    if config.file_output {
        std::fs::create_dir_all(&config.dir)
            .with_context(|| format!("failed to create log directory {}", config.dir))?;

        let file_appender = rolling::daily(&config.dir, "callwatch.log");
        let (writer, guard) = non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .context("failed to initialize tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()
            .context("failed to initialize tracing subscriber")?;
    }

    Ok(())
}
