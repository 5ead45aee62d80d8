//! callwatch binary: login, then poll until interrupted.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{error, info};

use callwatch::application::{CallProcessor, NotificationDispatcher, Poller};
use callwatch::domain::InMemorySeenCalls;
use callwatch::infrastructure::config::AppConfig;
use callwatch::infrastructure::logging::init_logging;
use callwatch::infrastructure::{AudioPipeline, CallTableParser, SessionManager, TelegramNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("CALLWATCH_CONFIG").unwrap_or_else(|_| "config/callwatch".to_string());
    let config = AppConfig::load(&config_path)?;

    init_logging(&config.logging)?;
    info!(
        "callwatch starting: dashboard {}, chat {}, tick {}s",
        config.dashboard.base_url, config.telegram.chat_id, config.poller.tick_seconds
    );

    let manager = SessionManager::new(config.dashboard.clone());
    let Some(session) = manager.login(config.dashboard.login_max_retries).await else {
        error!("Login failed after {} attempts", config.dashboard.login_max_retries);
        return Err(anyhow!("could not establish a dashboard session"));
    };

    let notifier = Arc::new(TelegramNotifier::new(config.telegram.clone())?);
    let dispatcher = Arc::new(NotificationDispatcher::new(notifier));
    let pipeline = Arc::new(AudioPipeline::new(
        dispatcher.clone(),
        session.cookie_jar(),
        session.base_url(),
        &config.dashboard.user_agent,
        &config.audio.work_dir,
    )?);

    let processor = CallProcessor::new(
        CallTableParser::new().map_err(|e| anyhow!("selector configuration invalid: {}", e))?,
        InMemorySeenCalls::new(),
        dispatcher,
        pipeline,
        std::time::Duration::from_secs(config.poller.pipeline_delay_seconds),
    );

    let poller = Poller::new(session, processor, config.poller.clone());

    // Running pipeline tasks are not cancelled on shutdown; process exit
    // releases the session, which invalidates their in-flight requests.
    tokio::select! {
        result = poller.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            Ok(())
        }
    }
}
