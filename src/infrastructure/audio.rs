//! Audio pipeline: fetch, transcode and deliver call recordings
//!
//! Runs once per detected call, asynchronously and unsupervised: download
//! the raw recording with the session cookies, transcode it to mp3 with
//! ffmpeg, deliver it as an attachment, retract the earlier detected alert,
//! then delete the temporary artifacts. Any step failure aborts the
//! remaining delivery steps for that call only; the failure is logged and
//! never surfaced to the poll loop. Whatever temp files exist by then are
//! still removed.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::COOKIE;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::application::dispatch::{MessageHandle, Notify, NotificationDispatcher};
use crate::application::poller::RecordingPipeline;
use crate::domain::call::CallRecord;
use crate::infrastructure::config::defaults;

/// Recording fetch/transcode/deliver pipeline bound to one session's
/// cookie jar.
pub struct AudioPipeline<N: Notify> {
    dispatcher: Arc<NotificationDispatcher<N>>,
    client: reqwest::Client,
    cookie_jar: Arc<Jar>,
    base_url: String,
    work_dir: PathBuf,
}

impl<N: Notify> AudioPipeline<N> {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher<N>>,
        cookie_jar: Arc<Jar>,
        base_url: &str,
        user_agent: &str,
        work_dir: &str,
    ) -> Result<Self> {
        // Same user agent as the session client: recording fetches must
        // look like any other dashboard request.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECONDS))
            .user_agent(user_agent)
            .build()
            .map_err(|e| anyhow!("Failed to create recording fetch client: {}", e))?;

        Ok(Self {
            dispatcher,
            client,
            cookie_jar,
            base_url: base_url.to_string(),
            work_dir: PathBuf::from(work_dir),
        })
    }

    /// Temp file paths for one call, keyed by timestamp + cli number so
    /// concurrent pipelines never collide within a run.
    fn artifact_paths(&self, cli_number: &str) -> (PathBuf, PathBuf) {
        let stamp = chrono::Utc::now().timestamp_millis();
        let raw = self.work_dir.join(format!("rec-{}-{}.wav", stamp, cli_number));
        let mp3 = raw.with_extension("mp3");
        (raw, mp3)
    }

    /// Download the recording bytes using the session's cookie header.
    async fn fetch_recording(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Ok(parsed) = url.parse() {
            if let Some(cookies) = self.cookie_jar.cookies(&parsed) {
                request = request.header(COOKIE, cookies);
            }
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("recording fetch failed: {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("recording fetch returned {}", response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .context("failed to read recording body")?;
        Ok(bytes.to_vec())
    }

    /// Transcode the raw recording to mp3. A non-zero ffmpeg exit aborts
    /// delivery; there is no retry.
    async fn transcode(&self, raw: &Path, mp3: &Path) -> Result<()> {
        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(raw)
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-qscale:a")
            .arg("4")
            .arg(mp3)
            .output()
            .await
            .context("failed to spawn ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim().lines().last().unwrap_or_default()
            ));
        }
        Ok(())
    }

    /// The delivery chain; aborts at the first failing step.
    async fn deliver(
        &self,
        call: &CallRecord,
        handle: Option<MessageHandle>,
        raw: &Path,
        mp3: &Path,
    ) -> Result<()> {
        let audio = call
            .audio
            .as_ref()
            .ok_or_else(|| anyhow!("call has no audio reference"))?;
        let url = audio.sound_url(&self.base_url);

        let bytes = self.fetch_recording(&url).await?;
        tokio::fs::write(raw, &bytes)
            .await
            .with_context(|| format!("failed to write {}", raw.display()))?;

        self.transcode(raw, mp3).await?;

        if !self.dispatcher.deliver_recording(call, mp3).await {
            return Err(anyhow!("attachment delivery rejected by transport"));
        }

        if let Some(handle) = handle {
            // Best-effort: retract failures are logged by the dispatcher.
            self.dispatcher.retract(handle).await;
        }

        Ok(())
    }

    /// Remove whichever temp artifacts exist. Failures are logged only.
    async fn cleanup(&self, paths: &[&Path]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!("Removed temp artifact {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

#[async_trait]
impl<N: Notify + 'static> RecordingPipeline for AudioPipeline<N> {
    async fn process(&self, call: CallRecord, handle: Option<MessageHandle>) {
        let (raw, mp3) = self.artifact_paths(&call.cli_number);

        match self.deliver(&call, handle, &raw, &mp3).await {
            Ok(()) => info!("Recording delivered for {}", call.cli_number),
            Err(e) => error!("Audio pipeline aborted for {}: {:#}", call.cli_number, e),
        }

        self.cleanup(&[&raw, &mp3]).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::TelegramConfig;
    use crate::infrastructure::telegram::TelegramNotifier;

    fn pipeline(dir: &str) -> AudioPipeline<TelegramNotifier> {
        let notifier = Arc::new(
            TelegramNotifier::new(TelegramConfig {
                bot_token: "123:abc".into(),
                chat_id: 1,
                promo_buttons: vec![],
            })
            .unwrap(),
        );
        AudioPipeline::new(
            Arc::new(NotificationDispatcher::new(notifier)),
            Arc::new(Jar::default()),
            "https://panel.example.com",
            "test-agent",
            dir,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn recording_fetch_sends_the_configured_user_agent() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let p = pipeline("/tmp");
        let url = format!("http://{}/live/calls/sound?did=d&uuid=u", addr);
        let bytes = p.fetch_recording(&url).await.unwrap();
        assert_eq!(bytes, b"ok");

        let request = server.await.unwrap();
        assert!(
            request
                .lines()
                .any(|l| l.eq_ignore_ascii_case("user-agent: test-agent")),
            "request carried no user agent:\n{}",
            request
        );
    }

    #[test]
    fn artifact_paths_are_keyed_by_cli_number() {
        let p = pipeline("/tmp");
        let (raw, mp3) = p.artifact_paths("447700900123");
        assert!(raw.to_string_lossy().contains("447700900123"));
        assert!(raw.to_string_lossy().ends_with(".wav"));
        assert!(mp3.to_string_lossy().ends_with(".mp3"));
        assert_eq!(raw.parent(), mp3.parent());
    }

    #[tokio::test]
    async fn cleanup_removes_existing_and_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path().to_str().unwrap());

        let existing = dir.path().join("rec-1-x.wav");
        tokio::fs::write(&existing, b"data").await.unwrap();
        let missing = dir.path().join("rec-1-x.mp3");

        p.cleanup(&[&existing, &missing]).await;
        assert!(!existing.exists());
    }
}
