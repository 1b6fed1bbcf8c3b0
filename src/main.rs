//! BanShield — Entry Point
//!
//! One binary, four roles. Each role is its own process; they hand
//! work to each other by launching `banshield <role>` with the trade
//! key in the environment.
//!
//! Wiring sequence:
//! 1. Parse CLI, load config.toml + env overrides, validate
//! 2. Init tracing (JSON structured logging) and the panic hook
//! 3. Spawn the health/metrics server when enabled
//! 4. Load the account secrets from env, log in with a Steam Guard code
//! 5. Run the role on its own task; map its result, or its panic, to
//!    the process exit code

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use banshield::adapters::launcher::{ProcessLauncher, TRADE_KEY_ENV};
use banshield::adapters::metrics::{HealthServer, HealthState, SettlementMetrics};
use banshield::adapters::notify::{ConsoleAlert, NotifierSet, TelegramNotifier};
use banshield::adapters::profile::SteamProfileProbe;
use banshield::adapters::steam::{guard, SteamClient, SteamClientConfig, SteamPlatform};
use banshield::config::credentials::{credentials_from_env, Account, TelegramCredentials};
use banshield::config::{loader, AppConfig};
use banshield::domain::matcher::OfferMatcher;
use banshield::domain::trade_key::TradeKey;
use banshield::ports::platform::TradePlatform;
use banshield::ports::telemetry::{NoopTelemetry, Telemetry};
use banshield::usecases::{
  BanMonitor, MonitorOutcome, ReceiverMatcher, RoleError, SendOutcome, Sender, Supervisor,
};

/// Grace period for log output before a failing process exits.
const EXIT_FLUSH: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "banshield", version, about = "Move a Steam inventory to a backup account when a ban hits")]
struct Cli {
  /// Path to the configuration file.
  #[arg(long, global = true, default_value = "config.toml")]
  config: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Watch the receiving account until the transfer settles.
  Supervise,
  /// Send every tradable item to the receiving account in one offer.
  Send,
  /// Accept the incoming offer tagged with TRADE_KEY.
  Accept {
    /// Trade key the offer message must equal.
    #[arg(env = "BANSHIELD_TRADE_KEY", hide_env_values = true)]
    trade_key: Option<String>,
  },
  /// Watch the sending account's profile and start the transfer on a fresh ban.
  Monitor,
}

impl Command {
  const fn name(&self) -> &'static str {
    match self {
      Self::Supervise => "supervise",
      Self::Send => "send",
      Self::Accept { .. } => "accept",
      Self::Monitor => "monitor",
    }
  }
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();

  // ── 1. Load configuration ───────────────────────────────
  let config = match loader::load_config(&cli.config) {
    Ok(config) => config,
    Err(e) => {
      init_tracing("info");
      error!(error = format!("{e:#}"), "Failed to load configuration");
      return fail().await;
    }
  };

  // ── 2. Structured JSON logging + panic hook ─────────────
  init_tracing(&config.bot.log_level);
  install_panic_hook();

  info!(
    name = %config.bot.name,
    version = env!("CARGO_PKG_VERSION"),
    role = cli.command.name(),
    dry_run = config.bot.dry_run,
    "Starting BanShield"
  );

  // ── 3. Run the role ─────────────────────────────────────
  match role_result(tokio::spawn(run(cli, config))).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!(error = format!("{e:#}"), "Role failed");
      fail().await
    }
  }
}

/// Result of the role task; a panic becomes an ordinary failure.
async fn role_result(role: JoinHandle<Result<()>>) -> Result<()> {
  match role.await {
    Ok(result) => result,
    Err(e) if e.is_panic() => Err(anyhow::anyhow!("role panicked")),
    Err(e) => Err(anyhow::anyhow!("role task did not finish: {e}")),
  }
}

fn init_tracing(level: &str) {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
    )
    .json()
    .try_init();
}

fn install_panic_hook() {
  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |panic| {
    error!(panic = %panic, "Unhandled panic");
    default_hook(panic);
  }));
}

/// Give the log writer a moment, then report failure.
async fn fail() -> ExitCode {
  tokio::time::sleep(EXIT_FLUSH).await;
  ExitCode::FAILURE
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
  let launcher = Arc::new(ProcessLauncher::current(&cli.config)?);

  match cli.command {
    Command::Supervise => {
      let key = inherited_key()?;
      let observability = Observability::start(&config);
      let platform = login(&config, Account::Receiver).await?;
      observability.mark_ready();

      let notifier = Arc::new(notifiers(&config));
      let result = Supervisor::new(platform, launcher, notifier, config.timing.clone(), key)
        .with_telemetry(observability.telemetry())
        .run()
        .await;
      observability.stop();
      result?;
    }

    Command::Send => {
      let key = match inherited_key()? {
        Some(key) => key,
        None => TradeKey::generate(),
      };
      let observability = Observability::start(&config);
      let platform = login(&config, Account::Sender).await?;
      observability.mark_ready();

      let outcome = Sender::new(platform, launcher, &config, key)?
        .with_telemetry(observability.telemetry())
        .run()
        .await;
      observability.stop();
      match outcome? {
        SendOutcome::NothingToSend => info!("Nothing to transfer"),
        SendOutcome::Simulated(items) => info!(items = items.len(), "Simulation complete"),
        SendOutcome::Sent { offer_id } => info!(%offer_id, "Offer sent and confirmed"),
        SendOutcome::Accepted { offer_id } => info!(%offer_id, "Offer accepted"),
        SendOutcome::Closed { offer_id, state } => {
          info!(%offer_id, %state, "Offer closed without acceptance");
        }
      }
    }

    Command::Accept { trade_key } => {
      let key = TradeKey::from_optional(trade_key.as_deref()).map_err(|e| {
        RoleError::Config(format!("a trade key of at least 16 URL-safe characters is required ({e})"))
      })?;
      let counterparty = config
        .transfer
        .counterparty()
        .map_err(|e| RoleError::Config(format!("{e:#}")))?;
      let observability = Observability::start(&config);
      let platform = login(&config, Account::Receiver).await?;
      observability.mark_ready();

      let offer_id = ReceiverMatcher::new(platform, OfferMatcher::new(key, counterparty), &config.timing)
        .with_telemetry(observability.telemetry())
        .run()
        .await;
      observability.stop();
      info!(%offer_id, "Transfer received");
    }

    Command::Monitor => {
      if config.monitor.profile_url.trim().is_empty() {
        return Err(RoleError::Config("monitor.profile_url is not set".to_string()).into());
      }
      let observability = Observability::start(&config);
      let (notifier, telegram) = notifiers_with_telegram(&config);
      if let Some(telegram) = telegram {
        if let Err(e) = telegram.reset().await {
          warn!(error = %e, "Telegram reset failed");
        }
      }
      let probe = Arc::new(SteamProfileProbe::new(
        steam_client(&config)?,
        &config.monitor.profile_url,
      ));
      observability.mark_ready();

      let outcome = BanMonitor::new(
        probe,
        launcher,
        Arc::new(notifier),
        config.monitor.clone(),
        config.timing.request_timeout(),
        config.bot.dry_run,
      )
      .with_telemetry(observability.telemetry())
      .run()
      .await;
      observability.stop();
      match outcome? {
        MonitorOutcome::Transferred { sender_exit } => {
          info!(sender_exit, "Transfer started, supervisor running");
        }
        MonitorOutcome::Simulated { check, sender_exit } => {
          info!(check, sender_exit, "Dry-run finished");
        }
      }
    }
  }

  Ok(())
}

/// Key handed down by the launching role, if any.
fn inherited_key() -> Result<Option<TradeKey>> {
  std::env::var(TRADE_KEY_ENV)
    .ok()
    .filter(|raw| !raw.trim().is_empty())
    .map(|raw| {
      TradeKey::parse(&raw)
        .map_err(|e| RoleError::Config(format!("{TRADE_KEY_ENV} is invalid: {e}")))
    })
    .transpose()
    .map_err(Into::into)
}

fn steam_client(config: &AppConfig) -> Result<SteamClient> {
  SteamClient::new(SteamClientConfig {
    timeout: config.timing.request_timeout(),
    max_concurrent: config.api.max_concurrent,
    min_request_interval: Duration::from_millis(config.api.min_request_interval_ms),
    ..SteamClientConfig::default()
  })
}

/// Log `account` in and return the platform bound to its session.
async fn login(config: &AppConfig, account: Account) -> Result<Arc<SteamPlatform>> {
  let credentials = credentials_from_env(account)
    .map_err(|e| RoleError::Config(format!("{e:#}")))?;
  let code = guard::current_auth_code(&credentials.shared_secret)?;

  let platform = SteamPlatform::new(
    steam_client(config)?,
    &config.api.web_api_url,
    &config.api.community_url,
  );
  let session = platform
    .authenticate(&credentials, &code)
    .await
    .with_context(|| format!("Login failed for {}", credentials.account_name))?;
  info!(account = %session.account_name, steam_id = %session.steam_id, "Logged into Steam");
  Ok(Arc::new(platform))
}

fn notifiers(config: &AppConfig) -> NotifierSet {
  notifiers_with_telegram(config).0
}

fn notifiers_with_telegram(config: &AppConfig) -> (NotifierSet, Option<Arc<TelegramNotifier>>) {
  let set = NotifierSet::new().with(Arc::new(ConsoleAlert));
  if !config.notify.telegram_enabled {
    return (set, None);
  }
  let Some(credentials) = TelegramCredentials::from_env() else {
    warn!("Telegram enabled but TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID missing, disabled");
    return (set, None);
  };
  match TelegramNotifier::new(&config.notify.telegram_api_url, credentials, &config.notify.state_file) {
    Ok(telegram) => {
      let telegram = Arc::new(telegram);
      (set.with(telegram.clone()), Some(telegram))
    }
    Err(e) => {
      warn!(error = %e, "Telegram notifier unavailable");
      (set, None)
    }
  }
}

/// Metrics registry and health server, one per role process.
///
/// A worker launched beside a parent that already serves the port logs
/// the bind failure and keeps counting.
struct Observability {
  metrics: Option<Arc<SettlementMetrics>>,
  health: Option<HealthState>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Observability {
  fn start(config: &AppConfig) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    if !config.metrics.enabled {
      return Self { metrics: None, health: None, shutdown_tx };
    }

    let metrics = match SettlementMetrics::new() {
      Ok(metrics) => Arc::new(metrics),
      Err(e) => {
        warn!(error = %e, "Metrics registry unavailable");
        return Self { metrics: None, health: None, shutdown_tx };
      }
    };
    let health = HealthState::new(Arc::clone(&metrics));
    let server = HealthServer::new(health.clone(), &config.metrics.bind_address);
    let shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
      if let Err(e) = server.run(shutdown_rx).await {
        warn!(error = %e, "Health server stopped");
      }
    });

    Self {
      metrics: Some(metrics),
      health: Some(health),
      shutdown_tx,
    }
  }

  fn telemetry(&self) -> Arc<dyn Telemetry> {
    match &self.metrics {
      Some(metrics) => Arc::clone(metrics) as Arc<dyn Telemetry>,
      None => Arc::new(NoopTelemetry),
    }
  }

  fn mark_ready(&self) {
    if let Some(health) = &self.health {
      health.mark_ready();
    }
  }

  fn stop(&self) {
    let _ = self.shutdown_tx.send(());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn exploding_role() -> Result<()> {
    panic!("inventory exploded")
  }

  #[tokio::test]
  async fn test_role_panic_becomes_failure() {
    let err = role_result(tokio::spawn(exploding_role())).await.unwrap_err();
    assert!(err.to_string().contains("panicked"));
  }

  #[tokio::test]
  async fn test_role_result_passes_through() {
    assert!(role_result(tokio::spawn(async { Ok::<(), anyhow::Error>(()) })).await.is_ok());
    let err = role_result(tokio::spawn(async { Err::<(), _>(anyhow::anyhow!("login refused")) }))
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "login refused");
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_waits_for_log_flush() {
    let started = tokio::time::Instant::now();
    let _code = fail().await;
    assert!(started.elapsed() >= EXIT_FLUSH);
  }
}
