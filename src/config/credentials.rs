//! Account Credentials — Loaded from Environment Variables
//!
//! Secrets for both accounts come from the environment (`.env` never
//! committed to git). Missing or short values are configuration errors
//! and stop the role before it touches the platform.

use anyhow::{Context, Result};
use base64::Engine;

use crate::domain::offer::SteamId;
use crate::ports::platform::AccountCredentials;

/// Shortest refresh token we accept.
const MIN_TOKEN_LEN: usize = 16;

/// Which account a role logs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account {
  /// The watched profile that gives its items away.
  Sender,
  /// The bank account that receives them.
  Receiver,
}

impl Account {
  const fn prefix(self) -> &'static str {
    match self {
      Self::Sender => "SENDER",
      Self::Receiver => "RECEIVER",
    }
  }
}

/// Load credentials for `account` from the process environment.
///
/// Required: `<PREFIX>_ACCOUNT_NAME`, `<PREFIX>_STEAM_ID`,
/// `<PREFIX>_REFRESH_TOKEN`, `<PREFIX>_SHARED_SECRET`.
/// `SENDER_IDENTITY_SECRET` is required for the sender only.
///
/// # Errors
/// Returns error naming the first missing or invalid variable.
pub fn credentials_from_env(account: Account) -> Result<AccountCredentials> {
  credentials_from(account, |key| std::env::var(key).ok())
}

/// Same as `credentials_from_env` with an injectable lookup.
///
/// # Errors
/// Returns error naming the first missing or invalid variable.
pub fn credentials_from<F>(account: Account, env: F) -> Result<AccountCredentials>
where
  F: Fn(&str) -> Option<String>,
{
  let prefix = account.prefix();
  let required = |name: &str| -> Result<String> {
    let key = format!("{prefix}_{name}");
    env(&key)
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
      .with_context(|| format!("{key} not set"))
  };

  let account_name = required("ACCOUNT_NAME")?;

  let steam_id: SteamId = required("STEAM_ID")?
    .parse()
    .with_context(|| format!("{prefix}_STEAM_ID is not a valid SteamID64"))?;

  let refresh_token = required("REFRESH_TOKEN")?;
  anyhow::ensure!(
    refresh_token.len() >= MIN_TOKEN_LEN,
    "{prefix}_REFRESH_TOKEN is too short"
  );

  let shared_secret = required("SHARED_SECRET")?;
  check_secret(&shared_secret, &format!("{prefix}_SHARED_SECRET"))?;

  let identity_secret = match account {
    Account::Sender => {
      let secret = required("IDENTITY_SECRET")?;
      check_secret(&secret, "SENDER_IDENTITY_SECRET")?;
      Some(secret)
    }
    Account::Receiver => required("IDENTITY_SECRET").ok(),
  };

  Ok(AccountCredentials {
    account_name,
    steam_id,
    refresh_token,
    shared_secret,
    identity_secret,
  })
}

/// Secrets are base64 HMAC keys; reject anything that is not.
fn check_secret(secret: &str, key: &str) -> Result<()> {
  let decoded = base64::engine::general_purpose::STANDARD
    .decode(secret)
    .with_context(|| format!("{key} is not valid base64"))?;
  anyhow::ensure!(decoded.len() >= 16, "{key} is too short");
  Ok(())
}

/// Telegram bot credentials, if configured.
#[derive(Clone)]
pub struct TelegramCredentials {
  /// Bot token from `TELEGRAM_BOT_TOKEN`.
  pub bot_token: String,
  /// Target chat from `TELEGRAM_CHAT_ID`.
  pub chat_id: String,
}

impl TelegramCredentials {
  /// Read `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`; `None` if either is unset.
  pub fn from_env() -> Option<Self> {
    let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|v| !v.is_empty())?;
    let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|v| !v.is_empty())?;
    Some(Self { bot_token, chat_id })
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  const SECRET: &str = "cnOgv/KdpLoP6Nbh0GMkXkPXALQ=";

  fn sender_env() -> HashMap<String, String> {
    HashMap::from([
      ("SENDER_ACCOUNT_NAME".to_string(), "watching".to_string()),
      ("SENDER_STEAM_ID".to_string(), "76561198000000000".to_string()),
      ("SENDER_REFRESH_TOKEN".to_string(), "eyJhbGciOiJFZERTQSJ9.payload".to_string()),
      ("SENDER_SHARED_SECRET".to_string(), SECRET.to_string()),
      ("SENDER_IDENTITY_SECRET".to_string(), SECRET.to_string()),
    ])
  }

  #[test]
  fn test_sender_credentials_loaded() {
    let env = sender_env();
    let creds = credentials_from(Account::Sender, |k| env.get(k).cloned()).unwrap();
    assert_eq!(creds.account_name, "watching");
    assert_eq!(creds.steam_id.as_u64(), 76_561_198_000_000_000);
    assert!(creds.identity_secret.is_some());
    // Debug output never carries secrets.
    let debug = format!("{creds:?}");
    assert!(!debug.contains(SECRET));
    assert!(!debug.contains("payload"));
  }

  #[test]
  fn test_sender_requires_identity_secret() {
    let mut env = sender_env();
    env.remove("SENDER_IDENTITY_SECRET");
    let err = credentials_from(Account::Sender, |k| env.get(k).cloned()).unwrap_err();
    assert!(err.to_string().contains("SENDER_IDENTITY_SECRET"));
  }

  #[test]
  fn test_receiver_identity_secret_optional() {
    let env: HashMap<String, String> = sender_env()
      .into_iter()
      .filter(|(k, _)| k != "SENDER_IDENTITY_SECRET")
      .map(|(k, v)| (k.replace("SENDER", "RECEIVER"), v))
      .collect();
    let creds = credentials_from(Account::Receiver, |k| env.get(k).cloned()).unwrap();
    assert!(creds.identity_secret.is_none());
  }

  #[test]
  fn test_short_or_invalid_secrets_rejected() {
    let mut env = sender_env();
    env.insert("SENDER_SHARED_SECRET".to_string(), "c2hvcnQ=".to_string());
    assert!(credentials_from(Account::Sender, |k| env.get(k).cloned()).is_err());

    env.insert("SENDER_SHARED_SECRET".to_string(), "not base64!!".to_string());
    assert!(credentials_from(Account::Sender, |k| env.get(k).cloned()).is_err());

    let mut env = sender_env();
    env.insert("SENDER_REFRESH_TOKEN".to_string(), "short".to_string());
    assert!(credentials_from(Account::Sender, |k| env.get(k).cloned()).is_err());
  }
}
