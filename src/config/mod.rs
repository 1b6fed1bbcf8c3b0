//! Configuration Module - TOML-based Settlement Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides for the transfer switches.
//! Account secrets never live here: they are read from the
//! environment by `credentials`.

pub mod credentials;
pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::retry::RetryPolicy;

/// Top-level configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any role begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Identity and run mode.
  pub bot: BotConfig,
  /// Poll intervals, deadlines and timeouts.
  #[serde(default)]
  pub timing: TimingConfig,
  /// Out-of-band confirmation retry budget.
  #[serde(default)]
  pub confirmation: ConfirmationConfig,
  /// What to transfer and where.
  pub transfer: TransferConfig,
  /// Platform endpoints and request pacing.
  #[serde(default)]
  pub api: ApiConfig,
  /// Ban monitor settings.
  #[serde(default)]
  pub monitor: MonitorConfig,
  /// Operator notifications.
  #[serde(default)]
  pub notify: NotifyConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable name used in logs.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Simulate only: list items, never create an offer.
  #[serde(default)]
  pub dry_run: bool,
}

/// Timing configuration. All values in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
  /// Fixed interval between polls.
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,
  /// Wall-clock window for an offer to appear / be accepted.
  #[serde(default = "default_watch_deadline")]
  pub watch_deadline_secs: u64,
  /// Pause after an escalation before the watch restarts.
  #[serde(default = "default_escalation_cooldown")]
  pub escalation_cooldown_secs: u64,
  /// Upper bound for any single platform call.
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// How long a failure alert stays up before the process exits.
  #[serde(default = "default_alert_hold")]
  pub alert_hold_secs: u64,
}

/// Confirmation retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
  /// Total confirmation attempts before giving up.
  #[serde(default = "default_confirm_attempts")]
  pub max_attempts: u32,
  /// Backoff growth factor (first delay = poll interval).
  #[serde(default = "default_backoff_multiplier")]
  pub backoff_multiplier: f64,
  /// Cap for a single backoff delay.
  #[serde(default = "default_max_delay")]
  pub max_delay_secs: u64,
}

/// Transfer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
  /// Receiver's trade URL (`.../tradeoffer/new/?partner=..&token=..`).
  #[serde(default)]
  pub trade_url: String,
  /// `all` or a comma-separated subset of cs2, tf2, dota2.
  #[serde(default = "default_inventories")]
  pub inventories: String,
  /// Start the receiver-side matcher right after sending.
  #[serde(default)]
  pub auto_accept: bool,
  /// Only accept offers from this SteamID64.
  pub expected_counterparty: Option<String>,
}

/// Platform endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Web API base URL.
  #[serde(default = "default_web_api_url")]
  pub web_api_url: String,
  /// Community site base URL.
  #[serde(default = "default_community_url")]
  pub community_url: String,
  /// Minimum spacing between requests (milliseconds).
  #[serde(default = "default_min_request_interval")]
  pub min_request_interval_ms: u64,
  /// Maximum concurrent requests.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
}

/// Ban monitor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
  /// Public profile of the watched (sending) account.
  #[serde(default)]
  pub profile_url: String,
  /// Seconds between checks, clamped to [20, 300].
  #[serde(default = "default_check_interval")]
  pub check_interval_secs: u64,
  /// Checks in a confirmation burst.
  #[serde(default = "default_confirm_checks")]
  pub confirm_checks: u32,
  /// Seconds between confirmation checks.
  #[serde(default = "default_confirm_wait")]
  pub confirm_wait_secs: u64,
  /// Fresh-ban sightings needed to confirm.
  #[serde(default = "default_min_alerts")]
  pub min_alerts: u32,
}

/// Notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
  /// Mirror alerts and status to Telegram.
  #[serde(default)]
  pub telegram_enabled: bool,
  /// Telegram Bot API base URL.
  #[serde(default = "default_telegram_url")]
  pub telegram_api_url: String,
  /// File remembering the last sent message id.
  #[serde(default = "default_state_file")]
  pub state_file: String,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve /live, /ready and /metrics.
  #[serde(default)]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl TimingConfig {
  pub const fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }

  pub const fn watch_deadline(&self) -> Duration {
    Duration::from_secs(self.watch_deadline_secs)
  }

  pub const fn escalation_cooldown(&self) -> Duration {
    Duration::from_secs(self.escalation_cooldown_secs)
  }

  pub const fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub const fn alert_hold(&self) -> Duration {
    Duration::from_secs(self.alert_hold_secs)
  }
}

impl AppConfig {
  /// Confirmation schedule: starts at the poll interval, grows, caps.
  pub fn confirmation_policy(&self) -> RetryPolicy {
    RetryPolicy {
      initial_delay: self.timing.poll_interval(),
      multiplier: self.confirmation.backoff_multiplier,
      max_delay: Duration::from_secs(self.confirmation.max_delay_secs),
      max_attempts: self.confirmation.max_attempts,
    }
  }
}

impl MonitorConfig {
  /// Check interval clamped to [20 s, 300 s].
  pub fn check_interval(&self) -> Duration {
    Duration::from_secs(self.check_interval_secs.clamp(20, 300))
  }

  pub const fn confirm_wait(&self) -> Duration {
    Duration::from_secs(self.confirm_wait_secs)
  }
}

impl Default for TimingConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: default_poll_interval(),
      watch_deadline_secs: default_watch_deadline(),
      escalation_cooldown_secs: default_escalation_cooldown(),
      request_timeout_secs: default_request_timeout(),
      alert_hold_secs: default_alert_hold(),
    }
  }
}

impl Default for ConfirmationConfig {
  fn default() -> Self {
    Self {
      max_attempts: default_confirm_attempts(),
      backoff_multiplier: default_backoff_multiplier(),
      max_delay_secs: default_max_delay(),
    }
  }
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      web_api_url: default_web_api_url(),
      community_url: default_community_url(),
      min_request_interval_ms: default_min_request_interval(),
      max_concurrent: default_max_concurrent(),
    }
  }
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      profile_url: String::new(),
      check_interval_secs: default_check_interval(),
      confirm_checks: default_confirm_checks(),
      confirm_wait_secs: default_confirm_wait(),
      min_alerts: default_min_alerts(),
    }
  }
}

impl Default for NotifyConfig {
  fn default() -> Self {
    Self {
      telegram_enabled: false,
      telegram_api_url: default_telegram_url(),
      state_file: default_state_file(),
    }
  }
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_poll_interval() -> u64 {
  5
}

const fn default_watch_deadline() -> u64 {
  300
}

const fn default_escalation_cooldown() -> u64 {
  2
}

const fn default_request_timeout() -> u64 {
  30
}

const fn default_alert_hold() -> u64 {
  30
}

const fn default_confirm_attempts() -> u32 {
  20
}

const fn default_backoff_multiplier() -> f64 {
  2.0
}

const fn default_max_delay() -> u64 {
  120
}

fn default_inventories() -> String {
  "all".to_string()
}

fn default_web_api_url() -> String {
  "https://api.steampowered.com".to_string()
}

fn default_community_url() -> String {
  "https://steamcommunity.com".to_string()
}

const fn default_min_request_interval() -> u64 {
  250
}

const fn default_max_concurrent() -> usize {
  4
}

const fn default_check_interval() -> u64 {
  20
}

const fn default_confirm_checks() -> u32 {
  10
}

const fn default_confirm_wait() -> u64 {
  5
}

const fn default_min_alerts() -> u32 {
  2
}

fn default_telegram_url() -> String {
  "https://api.telegram.org".to_string()
}

fn default_state_file() -> String {
  ".telegram_last_message_id".to_string()
}

fn default_metrics_addr() -> String {
  "127.0.0.1:9090".to_string()
}
