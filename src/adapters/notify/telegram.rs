//! Telegram notifier.
//!
//! Keeps a single live status message in the chat: before each send the
//! previous message (id remembered in a small state file) is deleted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::config::credentials::TelegramCredentials;
use crate::ports::notifier::{Alert, Notifier};

/// Messages removed by `reset`.
const RESET_DEPTH: i64 = 15;

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// `Notifier` posting to a Telegram chat through the Bot API.
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    credentials: TelegramCredentials,
    state_path: PathBuf,
    tmp_path: PathBuf,
}

impl TelegramNotifier {
    /// Create a notifier remembering its last message in `state_file`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(api_url: &str, credentials: TelegramCredentials, state_file: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build Telegram client")?;
        let state_path = PathBuf::from(state_file);
        let mut tmp_path = state_path.clone().into_os_string();
        tmp_path.push(".tmp");
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            state_path,
            tmp_path: PathBuf::from(tmp_path),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.credentials.bot_token)
    }

    async fn send_message(&self, text: &str) -> Result<i64> {
        let response: TelegramResponse<SentMessage> = self
            .http
            .post(self.method_url("sendMessage"))
            .form(&[("chat_id", self.credentials.chat_id.as_str()), ("text", text)])
            .send()
            .await
            .context("Telegram sendMessage failed")?
            .json()
            .await
            .context("Unexpected Telegram response")?;
        if !response.ok {
            anyhow::bail!(
                "Telegram refused the message: {}",
                response.description.unwrap_or_default()
            );
        }
        response
            .result
            .map(|m| m.message_id)
            .context("Telegram returned no message id")
    }

    async fn delete_message(&self, message_id: i64) -> Result<bool> {
        let response: TelegramResponse<bool> = self
            .http
            .post(self.method_url("deleteMessage"))
            .form(&[
                ("chat_id", self.credentials.chat_id.clone()),
                ("message_id", message_id.to_string()),
            ])
            .send()
            .await
            .context("Telegram deleteMessage failed")?
            .json()
            .await
            .context("Unexpected Telegram response")?;
        Ok(response.ok)
    }

    /// Last message id recorded in the state file.
    pub async fn last_message_id(&self) -> Option<i64> {
        let raw = fs::read_to_string(&self.state_path).await.ok()?;
        raw.trim().parse().ok()
    }

    /// Record `message_id` atomically (tmp → rename).
    async fn store_message_id(&self, message_id: i64) -> Result<()> {
        fs::write(&self.tmp_path, message_id.to_string())
            .await
            .context("Failed to write tmp state file")?;
        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .context("Failed to rename state file")?;
        Ok(())
    }

    /// Replace the previous message with `text`.
    #[instrument(skip_all)]
    async fn post(&self, text: &str) -> Result<()> {
        if let Some(previous) = self.last_message_id().await {
            if let Err(e) = self.delete_message(previous).await {
                debug!(error = %e, previous, "Could not delete previous message");
            }
        }
        let message_id = self.send_message(text).await?;
        self.store_message_id(message_id).await?;
        debug!(message_id, "Telegram message sent");
        Ok(())
    }

    /// Delete the most recent messages of the chat and forget the state file.
    ///
    /// # Errors
    /// Returns error if the anchor message cannot be sent.
    pub async fn reset(&self) -> Result<u32> {
        let anchor = self.send_message("reset").await?;
        let mut deleted = 0;
        for message_id in (anchor - RESET_DEPTH + 1)..=anchor {
            if matches!(self.delete_message(message_id).await, Ok(true)) {
                deleted += 1;
            }
        }
        if let Err(e) = fs::remove_file(&self.state_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "Could not remove Telegram state file");
            }
        }
        info!(deleted, "Telegram channel reset");
        Ok(deleted)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn alert(&self, alert: &Alert) -> Result<()> {
        let mut text = format!("[ALERT] {}", alert.reason);
        if let Some(offer_id) = &alert.offer_id {
            text.push_str(&format!("\noffer: {offer_id}"));
        }
        text.push_str(&format!("\n{}", alert.raised_at.format("%Y-%m-%d %H:%M:%S UTC")));
        self.post(&text).await
    }

    async fn report(&self, message: &str) -> Result<()> {
        self.post(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(dir: &tempfile::TempDir) -> TelegramNotifier {
        let creds = TelegramCredentials {
            bot_token: "123:abc".to_string(),
            chat_id: "-100".to_string(),
        };
        let state = dir.path().join(".telegram_last_message_id");
        TelegramNotifier::new("https://api.telegram.org/", creds, state.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_method_url() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            notifier(&dir).method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_state_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = notifier(&dir);
        assert_eq!(notifier.last_message_id().await, None);

        notifier.store_message_id(4711).await.unwrap();
        assert_eq!(notifier.last_message_id().await, Some(4711));
        assert!(!notifier.tmp_path.exists());

        notifier.store_message_id(4712).await.unwrap();
        assert_eq!(notifier.last_message_id().await, Some(4712));
    }

    #[tokio::test]
    async fn test_garbage_state_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = notifier(&dir);
        fs::write(&notifier.state_path, "not a number").await.unwrap();
        assert_eq!(notifier.last_message_id().await, None);
    }
}
