//! Telegram Bot API transport for message sending and deletion.
//!
//! Implements the outbound notification capability over the Bot API:
//! `sendMessage`, `sendAudio` (multipart upload with the configured inline
//! link buttons) and `deleteMessage`, each with a bounded request timeout.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::application::dispatch::{MessageHandle, Notify};
use crate::infrastructure::config::{defaults, TelegramConfig};

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Telegram notifier bound to one bot token and one chat.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| anyhow!("Failed to create Telegram client: {}", e))?;
        Ok(Self { config, client })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    /// Inline keyboard with the configured promo buttons, one per row.
    fn reply_markup(&self) -> Option<String> {
        if self.config.promo_buttons.is_empty() {
            return None;
        }
        let rows: Vec<Vec<serde_json::Value>> = self
            .config
            .promo_buttons
            .iter()
            .map(|b| vec![serde_json::json!({ "text": b.label, "url": b.url })])
            .collect();
        Some(serde_json::json!({ "inline_keyboard": rows }).to_string())
    }

    fn check<T>(method: &str, body: ApiResponse<T>) -> Result<T> {
        if !body.ok {
            return Err(anyhow!(
                "Telegram {} error: {}",
                method,
                body.description.unwrap_or_default()
            ));
        }
        body.result
            .ok_or_else(|| anyhow!("Telegram {} returned no result", method))
    }

    /// Send a plain text message to the configured chat.
    pub async fn send_message(&self, text: &str) -> Result<i64> {
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("sendMessage failed: {}", e))?;

        let parsed: ApiResponse<SentMessage> = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid sendMessage response: {}", e))?;

        Ok(Self::check("sendMessage", parsed)?.message_id)
    }

    /// Upload an audio file with a caption and the inline link buttons.
    pub async fn send_audio_file(&self, file: &Path, caption: &str) -> Result<()> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| anyhow!("Failed to read audio file {}: {}", file.display(), e))?;

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.mp3".to_string());

        let audio_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| anyhow!("Invalid audio part: {}", e))?;

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", self.config.chat_id.to_string())
            .text("caption", caption.to_string())
            .part("audio", audio_part);

        if let Some(markup) = self.reply_markup() {
            form = form.text("reply_markup", markup);
        }

        let response = self
            .client
            .post(self.api_url("sendAudio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow!("sendAudio failed: {}", e))?;

        let parsed: ApiResponse<SentMessage> = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid sendAudio response: {}", e))?;

        Self::check("sendAudio", parsed)?;
        Ok(())
    }

    /// Delete a previously sent message by identifier.
    pub async fn delete_message(&self, message_id: i64) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "message_id": message_id,
        });

        let response = self
            .client
            .post(self.api_url("deleteMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("deleteMessage failed: {}", e))?;

        let parsed: ApiResponse<bool> = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid deleteMessage response: {}", e))?;

        Self::check("deleteMessage", parsed)?;
        Ok(())
    }
}

#[async_trait]
impl Notify for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<MessageHandle> {
        self.send_message(text).await
    }

    async fn send_audio(&self, file: &Path, caption: &str) -> Result<()> {
        self.send_audio_file(file, caption).await
    }

    async fn delete(&self, handle: MessageHandle) -> Result<()> {
        self.delete_message(handle).await
    }
}
