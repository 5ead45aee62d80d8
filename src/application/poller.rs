//! Top-level polling loop over the live-calls view
//!
//! Re-reads the page on a fixed cadence, feeds rows through the parser,
//! consults the dedup registry and dispatches each new call: failed calls
//! get a synchronous alert, calls with a resolvable recording get a
//! detected alert plus a delayed audio-pipeline task. An independent timer
//! task reloads the page periodically to defeat dashboard staleness.
//!
//! Dedup marking happens synchronously inside the tick, before any task is
//! spawned; that ordering, not scan atomicity, is the correctness boundary.
//! A reload racing a scan can tear one read; the worst case is a skipped or
//! duplicated tick, which the registry absorbs.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::application::dispatch::{MessageHandle, Notify, NotificationDispatcher};
use crate::domain::call::CallRecord;
use crate::domain::dedup::CallRegistry;
use crate::infrastructure::config::PollerConfig;
use crate::infrastructure::parsing::CallTableParser;
use crate::infrastructure::session::Session;

/// Per-call recording workflow. Behind a trait so the poller's scheduling
/// is observable with a substitute in tests.
#[async_trait]
pub trait RecordingPipeline: Send + Sync + 'static {
    /// Run the download/transcode/deliver/retract/cleanup sequence for one
    /// call. Must not panic and must swallow its own failures.
    async fn process(&self, call: CallRecord, handle: Option<MessageHandle>);
}

/// The per-tick scan: parse rows, dedup, branch, schedule. Split from the
/// page-reading loop so it can run against static markup.
pub struct CallProcessor<R, N, P>
where
    R: CallRegistry,
    N: Notify,
    P: RecordingPipeline,
{
    parser: CallTableParser,
    registry: R,
    dispatcher: Arc<NotificationDispatcher<N>>,
    pipeline: Arc<P>,
    pipeline_delay: Duration,
}

impl<R, N, P> CallProcessor<R, N, P>
where
    R: CallRegistry,
    N: Notify + 'static,
    P: RecordingPipeline,
{
    pub fn new(
        parser: CallTableParser,
        registry: R,
        dispatcher: Arc<NotificationDispatcher<N>>,
        pipeline: Arc<P>,
        pipeline_delay: Duration,
    ) -> Self {
        Self {
            parser,
            registry,
            dispatcher,
            pipeline,
            pipeline_delay,
        }
    }

    /// Scan one snapshot of the page markup. Returns how many calls were
    /// newly dispatched (failed alerts and scheduled pipelines both count).
    pub async fn process_markup(&mut self, page_html: &str) -> usize {
        let calls = self.parser.parse(page_html);
        let mut dispatched = 0;

        for call in calls {
            if self.registry.seen(&call.cli_number) {
                continue;
            }
            // Mark before any dispatch so a dispatch error can never cause
            // a second dispatch of the same identifier.
            self.registry.mark(&call.cli_number);

            if call.status.is_failed() {
                info!("Failed call detected: {}", call.cli_number);
                self.dispatcher.notify_failed(&call).await;
                dispatched += 1;
            } else if call.has_audio() {
                info!("New call detected: {}", call.cli_number);
                let handle = self.dispatcher.notify_detected(&call).await;
                self.schedule_pipeline(call, handle);
                dispatched += 1;
            } else {
                // No resolvable audio URL: the row stays marked seen and
                // nothing is dispatched.
                debug!("Call {} has no resolvable audio URL, skipping", call.cli_number);
            }
        }

        dispatched
    }

    /// Spawn the call's pipeline after the configured delay, giving the
    /// dashboard time to finish writing the recording.
    fn schedule_pipeline(&self, call: CallRecord, handle: Option<MessageHandle>) {
        let pipeline = self.pipeline.clone();
        let delay = self.pipeline_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pipeline.process(call, handle).await;
        });
    }
}

/// The long-running loop: fixed-cadence scans plus the periodic refresh.
pub struct Poller<R, N, P>
where
    R: CallRegistry,
    N: Notify,
    P: RecordingPipeline,
{
    session: Session,
    processor: CallProcessor<R, N, P>,
    config: PollerConfig,
}

impl<R, N, P> Poller<R, N, P>
where
    R: CallRegistry,
    N: Notify + 'static,
    P: RecordingPipeline,
{
    pub fn new(session: Session, processor: CallProcessor<R, N, P>, config: PollerConfig) -> Self {
        Self {
            session,
            processor,
            config,
        }
    }

    /// Run until the surrounding task is cancelled. Tick errors back off
    /// and resume; they never terminate the loop.
    pub async fn run(mut self) -> Result<()> {
        let refresher = self.session.page_refresher();
        let refresh_interval = Duration::from_secs(self.config.refresh_interval_minutes * 60);
        // Detached for the life of the process; the poll loop below never
        // returns, so the task is reclaimed only at exit.
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(refresh_interval);
            timer.tick().await; // the first tick fires immediately
            loop {
                timer.tick().await;
                match refresher.reload().await {
                    Ok(()) => debug!("Periodic page refresh complete"),
                    Err(e) => warn!("Periodic page refresh failed: {}", e),
                }
            }
        });

        info!(
            "Polling started: tick {}s, refresh every {}m",
            self.config.tick_seconds, self.config.refresh_interval_minutes
        );

        loop {
            match self.tick().await {
                Ok(dispatched) => {
                    if dispatched > 0 {
                        debug!("Tick dispatched {} new call(s)", dispatched);
                    }
                    tokio::time::sleep(Duration::from_secs(self.config.tick_seconds)).await;
                }
                Err(e) => {
                    error!("Poll tick failed, backing off: {:#}", e);
                    tokio::time::sleep(Duration::from_secs(self.config.error_backoff_seconds))
                        .await;
                }
            }
        }
    }

    async fn tick(&mut self) -> Result<usize> {
        let markup = self.session.read_page().await?;
        Ok(self.processor.process_markup(&markup).await)
    }
}
