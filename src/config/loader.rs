//! Configuration Loader - File Loading, Overrides and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages
//! for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, TransferConfig};
use crate::domain::offer::SteamId;
use crate::domain::partition::{parse_selection, InventoryPartition};

/// Load, override and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content, |key| std::env::var(key).ok())?;

  info!(
    name = %config.bot.name,
    dry_run = config.bot.dry_run,
    auto_accept = config.transfer.auto_accept,
    inventories = %config.transfer.inventories,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML content, apply overrides from `env`, then validate.
///
/// # Errors
/// Returns error on malformed TOML, malformed overrides or failed validation.
pub fn parse_config<F>(content: &str, env: F) -> Result<AppConfig>
where
  F: Fn(&str) -> Option<String>,
{
  let mut config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse config.toml")?;

  apply_env_overrides(&mut config, env)?;
  validate_config(&config)?;

  Ok(config)
}

/// Apply the environment switches on top of the file values.
///
/// - `BANSHIELD_DRY_RUN=1` forces simulate-only mode
/// - `AUTO_ACCEPT=true|false`
/// - `INVENTORY_TYPE=all|cs2,tf2,...`
/// - `EXPECTED_SENDER_STEAMID=<steamid64>`
/// - `BANK_ACCOUNT_TRADE_URL=<url>`
fn apply_env_overrides<F>(config: &mut AppConfig, env: F) -> Result<()>
where
  F: Fn(&str) -> Option<String>,
{
  if env("BANSHIELD_DRY_RUN").as_deref() == Some("1") {
    config.bot.dry_run = true;
  }

  if let Some(raw) = env("AUTO_ACCEPT") {
    config.transfer.auto_accept = match raw.trim().to_lowercase().as_str() {
      "true" | "1" | "yes" => true,
      "false" | "0" | "no" | "" => false,
      other => anyhow::bail!("AUTO_ACCEPT must be true or false, got {other:?}"),
    };
  }

  if let Some(raw) = env("INVENTORY_TYPE") {
    config.transfer.inventories = raw;
  }

  if let Some(raw) = env("EXPECTED_SENDER_STEAMID") {
    if !raw.trim().is_empty() {
      config.transfer.expected_counterparty = Some(raw);
    }
  }

  if let Some(raw) = env("BANK_ACCOUNT_TRADE_URL") {
    config.transfer.trade_url = raw;
  }

  Ok(())
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive intervals and a deadline longer than the poll interval
/// - A bounded, non-shrinking confirmation backoff
/// - A parseable inventory selection and counterparty
/// - A trade URL carrying a partner
/// - A sane ban confirmation threshold
fn validate_config(config: &AppConfig) -> Result<()> {
  let timing = &config.timing;
  anyhow::ensure!(
    timing.poll_interval_secs > 0,
    "poll_interval_secs must be positive"
  );
  anyhow::ensure!(
    timing.watch_deadline_secs > timing.poll_interval_secs,
    "watch_deadline_secs ({}) must exceed poll_interval_secs ({})",
    timing.watch_deadline_secs,
    timing.poll_interval_secs
  );
  anyhow::ensure!(
    timing.request_timeout_secs > 0,
    "request_timeout_secs must be positive"
  );

  let confirmation = &config.confirmation;
  anyhow::ensure!(
    confirmation.max_attempts > 0,
    "confirmation.max_attempts must be positive"
  );
  anyhow::ensure!(
    confirmation.backoff_multiplier >= 1.0,
    "confirmation.backoff_multiplier must be >= 1.0, got {}",
    confirmation.backoff_multiplier
  );

  config.transfer.partitions()?;
  config.transfer.counterparty()?;

  anyhow::ensure!(
    !config.transfer.trade_url.trim().is_empty(),
    "transfer.trade_url is not set (config file or BANK_ACCOUNT_TRADE_URL)"
  );
  anyhow::ensure!(
    config.transfer.trade_url.contains("partner="),
    "trade_url must contain a partner parameter"
  );

  let monitor = &config.monitor;
  anyhow::ensure!(
    monitor.confirm_checks > 0,
    "monitor.confirm_checks must be positive"
  );
  anyhow::ensure!(
    monitor.min_alerts > 0 && monitor.min_alerts <= monitor.confirm_checks,
    "monitor.min_alerts must be in [1, {}], got {}",
    monitor.confirm_checks,
    monitor.min_alerts
  );

  anyhow::ensure!(
    config.api.max_concurrent > 0,
    "api.max_concurrent must be positive"
  );

  Ok(())
}

impl TransferConfig {
  /// Parsed inventory selection.
  ///
  /// # Errors
  /// Returns error for an empty or unknown selection.
  pub fn partitions(&self) -> Result<Vec<InventoryPartition>> {
    parse_selection(&self.inventories)
      .with_context(|| format!("Invalid inventory selection {:?}", self.inventories))
  }

  /// Parsed expected counterparty.
  ///
  /// # Errors
  /// Returns error when the configured id is malformed.
  pub fn counterparty(&self) -> Result<Option<SteamId>> {
    self
      .expected_counterparty
      .as_deref()
      .filter(|raw| !raw.trim().is_empty())
      .map(|raw| {
        raw
          .parse::<SteamId>()
          .with_context(|| format!("Invalid expected_counterparty {raw:?}"))
      })
      .transpose()
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  const MINIMAL: &str = r#"
    [bot]
    name = "banshield-test"

    [transfer]
    trade_url = "https://steamcommunity.com/tradeoffer/new/?partner=39734272&token=AbCdEf12"
  "#;

  fn no_env(_: &str) -> Option<String> {
    None
  }

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_defaults_applied() {
    let config = parse_config(MINIMAL, no_env).unwrap();
    assert_eq!(config.timing.poll_interval_secs, 5);
    assert_eq!(config.timing.watch_deadline_secs, 300);
    assert_eq!(config.confirmation.max_attempts, 20);
    assert_eq!(config.transfer.inventories, "all");
    assert!(!config.transfer.auto_accept);
    assert!(!config.bot.dry_run);
    assert_eq!(config.transfer.partitions().unwrap().len(), 4);
    assert_eq!(config.transfer.counterparty().unwrap(), None);
  }

  #[test]
  fn test_env_overrides() {
    let env: HashMap<&str, &str> = HashMap::from([
      ("BANSHIELD_DRY_RUN", "1"),
      ("AUTO_ACCEPT", "TRUE"),
      ("INVENTORY_TYPE", "cs2, tf2"),
      ("EXPECTED_SENDER_STEAMID", "76561198000000000"),
    ]);
    let config = parse_config(MINIMAL, |k| env.get(k).map(ToString::to_string)).unwrap();
    assert!(config.bot.dry_run);
    assert!(config.transfer.auto_accept);
    assert_eq!(config.transfer.partitions().unwrap().len(), 2);
    assert_eq!(
      config.transfer.counterparty().unwrap(),
      Some(SteamId::new(76_561_198_000_000_000))
    );
  }

  #[test]
  fn test_invalid_overrides_rejected() {
    let bad_bool = |k: &str| (k == "AUTO_ACCEPT").then(|| "maybe".to_string());
    assert!(parse_config(MINIMAL, bad_bool).is_err());

    let bad_inventory = |k: &str| (k == "INVENTORY_TYPE").then(|| "csgo".to_string());
    assert!(parse_config(MINIMAL, bad_inventory).is_err());

    let bad_partner = |k: &str| (k == "EXPECTED_SENDER_STEAMID").then(|| "abc".to_string());
    assert!(parse_config(MINIMAL, bad_partner).is_err());
  }

  #[test]
  fn test_zero_interval_rejected() {
    let content = format!("{MINIMAL}\n[timing]\npoll_interval_secs = 0\n");
    assert!(parse_config(&content, no_env).is_err());
  }

  #[test]
  fn test_trade_url_needs_partner() {
    let content = r#"
      [bot]
      name = "x"
      [transfer]
      trade_url = "https://example.com/somewhere"
    "#;
    assert!(parse_config(content, no_env).is_err());
  }

  #[test]
  fn test_empty_trade_url_rejected_unless_overridden() {
    let content = "[bot]\nname = \"x\"\n[transfer]\n";
    assert!(parse_config(content, no_env).is_err());

    let url = |k: &str| {
      (k == "BANK_ACCOUNT_TRADE_URL")
        .then(|| "https://steamcommunity.com/tradeoffer/new/?partner=1&token=t".to_string())
    };
    assert!(parse_config(content, url).is_ok());
  }

  #[test]
  fn test_monitor_interval_clamped() {
    let content = format!("{MINIMAL}\n[monitor]\ncheck_interval_secs = 3\n");
    let config = parse_config(&content, no_env).unwrap();
    assert_eq!(config.monitor.check_interval().as_secs(), 20);
  }
}
