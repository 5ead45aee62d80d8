//! Notification dispatch: message composition over a generic transport
//!
//! The transport is anything that can send a plain message, send an audio
//! attachment and delete a previously sent message. Transport failures are
//! logged and never propagate: the poll loop and the audio pipeline must
//! keep running regardless of the messaging channel's health.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::call::CallRecord;
use crate::utils::{format_duration, mask_number};

/// Opaque handle of a sent "detected" alert, used to retract it after the
/// recording has been delivered.
pub type MessageHandle = i64;

/// Outbound notification capability.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Send a plain message; returns the transport's message handle.
    async fn send(&self, text: &str) -> anyhow::Result<MessageHandle>;

    /// Send a message with an audio attachment.
    async fn send_audio(&self, file: &Path, caption: &str) -> anyhow::Result<()>;

    /// Delete a previously sent message.
    async fn delete(&self, handle: MessageHandle) -> anyhow::Result<()>;
}

/// Composes and dispatches the per-call notifications.
pub struct NotificationDispatcher<N: Notify> {
    notifier: Arc<N>,
}

impl<N: Notify> NotificationDispatcher<N> {
    pub fn new(notifier: Arc<N>) -> Self {
        Self { notifier }
    }

    /// Send the immediate "call detected" alert. Returns the message handle
    /// so the audio pipeline can retract it later; `None` on transport
    /// failure (logged, non-fatal).
    pub async fn notify_detected(&self, call: &CallRecord) -> Option<MessageHandle> {
        let text = detected_text(call);
        match self.notifier.send(&text).await {
            Ok(handle) => {
                info!("Detected alert sent for {}", mask_number(&call.cli_number));
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to send detected alert: {}", e);
                None
            }
        }
    }

    /// Send the "call failed" message. Fire-and-forget.
    pub async fn notify_failed(&self, call: &CallRecord) {
        let text = failed_text(call);
        if let Err(e) = self.notifier.send(&text).await {
            warn!("Failed to send failed-call alert: {}", e);
        }
    }

    /// Deliver a recording with its caption. Returns whether the transport
    /// accepted it.
    pub async fn deliver_recording(&self, call: &CallRecord, file: &Path) -> bool {
        let caption = recording_caption(call);
        match self.notifier.send_audio(file, &caption).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to deliver recording: {}", e);
                false
            }
        }
    }

    /// Best-effort deletion of an earlier detected alert.
    pub async fn retract(&self, handle: MessageHandle) -> bool {
        match self.notifier.delete(handle).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to retract detected alert {}: {}", handle, e);
                false
            }
        }
    }
}

/// Short low-information alert sent the moment a call appears.
pub fn detected_text(call: &CallRecord) -> String {
    format!(
        "📞 New call detected\n🌍 {}\n📱 {}",
        call.country,
        mask_number(&call.number)
    )
}

/// Richer message for failed calls: country, number, duration, timestamp.
pub fn failed_text(call: &CallRecord) -> String {
    format!(
        "❌ Call failed\n🌍 Country: {}\n📱 Number: {}\n⏱ Duration: {}\n🕐 {}",
        call.country,
        mask_number(&call.number),
        format_duration(call.duration),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Caption attached to the delivered recording.
pub fn recording_caption(call: &CallRecord) -> String {
    format!(
        "🎙 Recording — {} {} ({})",
        call.country,
        mask_number(&call.number),
        format_duration(call.duration),
    )
}
