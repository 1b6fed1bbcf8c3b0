//! Ban Monitor Use Case - Starting the Handoff on a Fresh Ban
//!
//! Checks the watched profile at a fixed interval. A fresh ban is
//! confirmed by a burst of repeat checks before anything moves; then a
//! Sender runs to completion and a Supervisor takes over, both keyed
//! with the same freshly generated trade key.
//!
//! In dry-run the monitor fakes a ban at a random check and runs the
//! Sender in simulate-only mode; no Supervisor is started.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{info, warn};

use super::with_timeout;
use crate::config::MonitorConfig;
use crate::domain::ban::{BanStatus, CheckTally};
use crate::domain::trade_key::TradeKey;
use crate::ports::launcher::{WorkerLaunch, WorkerLauncher};
use crate::ports::notifier::{Alert, Notifier};
use crate::ports::profile::ProfileProbe;
use crate::ports::telemetry::{NoopTelemetry, Telemetry};

/// Earliest and latest check a dry-run ban is simulated at.
const SIMULATED_BAN_CHECKS: std::ops::RangeInclusive<u32> = 3..=10;

/// How a monitor run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
  /// Ban confirmed; the sender ran and a supervisor was launched.
  Transferred {
    /// Exit code of the sender.
    sender_exit: i32,
  },
  /// Dry-run: a simulated ban triggered a simulate-only sender.
  Simulated {
    /// Check number the ban was simulated at.
    check: u32,
    /// Exit code of the sender.
    sender_exit: i32,
  },
}

/// Watches the sending account for a fresh ban.
pub struct BanMonitor<B: ProfileProbe, L: WorkerLauncher, N: Notifier> {
  probe: Arc<B>,
  launcher: Arc<L>,
  notifier: Arc<N>,
  settings: MonitorConfig,
  request_timeout: Duration,
  /// Dry-run only: check number that fakes a ban.
  simulate_at: Option<u32>,
  telemetry: Arc<dyn Telemetry>,
}

impl<B: ProfileProbe, L: WorkerLauncher, N: Notifier> BanMonitor<B, L, N> {
  /// Create a monitor; `dry_run` picks a random simulated-ban check.
  pub fn new(
    probe: Arc<B>,
    launcher: Arc<L>,
    notifier: Arc<N>,
    settings: MonitorConfig,
    request_timeout: Duration,
    dry_run: bool,
  ) -> Self {
    let simulate_at = dry_run.then(|| rand::thread_rng().gen_range(SIMULATED_BAN_CHECKS));
    Self {
      probe,
      launcher,
      notifier,
      settings,
      request_timeout,
      simulate_at,
      telemetry: Arc::new(NoopTelemetry),
    }
  }

  /// Count profile checks and alerts in `telemetry`.
  #[must_use]
  pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
    self.telemetry = telemetry;
    self
  }

  /// Fix the simulated-ban check (dry-run only).
  #[must_use]
  pub fn with_simulated_ban_at(mut self, check: u32) -> Self {
    if self.simulate_at.is_some() {
      self.simulate_at = Some(check.max(2));
    }
    self
  }

  /// Run until a ban is confirmed (or simulated).
  ///
  /// # Errors
  /// Returns error only if the sender cannot be started at all.
  pub async fn run(&self) -> anyhow::Result<MonitorOutcome> {
    match self.simulate_at {
      Some(check) => info!(check, "Dry-run: a ban will be simulated"),
      None => info!("Live ban monitoring active"),
    }

    let mut check = 0u32;
    loop {
      check += 1;
      let status = self.check_once(check).await;

      if let Some(status) = status {
        if self.simulate_at.is_some_and(|at| check >= at) {
          return self.simulate(check).await;
        }

        if status.is_fresh() {
          if self.confirm_ban().await {
            if self.simulate_at.is_some() {
              return self.simulate(check).await;
            }
            return self.transfer().await;
          }
          info!("Repeat checks found no reliable ban, false positive prevented");
          self.report("[SAFEGUARD] False-positive ban alert prevented.").await;
        }
      }

      sleep(self.settings.check_interval()).await;
    }
  }

  /// One profile check; `None` on fetch failure.
  async fn check_once(&self, check: u32) -> Option<BanStatus> {
    let result = with_timeout(self.request_timeout, self.probe.check()).await;
    self.telemetry.ban_check(result.as_ref().ok());
    match result {
      Ok(status) => {
        info!(check, %status, "Profile checked");
        if !status.is_fresh() {
          self.report(&status.to_string()).await;
        }
        Some(status)
      }
      Err(e) => {
        warn!(check, error = %e, "Profile check failed");
        self.report(&format!("[ERROR] {e}")).await;
        None
      }
    }
  }

  /// Repeat the check `confirm_checks` times.
  async fn confirm_ban(&self) -> bool {
    let total = self.settings.confirm_checks;
    let mut tally = CheckTally::default();
    for i in 1..=total {
      let status = with_timeout(self.request_timeout, self.probe.check()).await;
      self.telemetry.ban_check(status.as_ref().ok());
      match &status {
        Ok(status) => info!(check = i, total, %status, "Confirmation check"),
        Err(e) => warn!(check = i, total, error = %e, "Confirmation check failed"),
      }
      tally.record(status.as_ref().ok());
      sleep(self.settings.confirm_wait()).await;
    }
    info!(
      alerts = tally.alerts,
      errors = tally.errors,
      total = tally.total,
      "Confirmation summary"
    );
    tally.confirmed(self.settings.min_alerts)
  }

  /// Confirmed ban: send everything, then hand over to a supervisor.
  async fn transfer(&self) -> anyhow::Result<MonitorOutcome> {
    let key = TradeKey::generate();
    let alert = Alert::new("Ban confirmed, transferring inventory", None);
    self.telemetry.alert();
    if let Err(e) = self.notifier.alert(&alert).await {
      warn!(error = %e, "Alert delivery failed");
    }
    info!(key = %key, "Ban confirmed by repeat checks, starting sender");

    let sender_exit = self
      .launcher
      .run_to_completion(&WorkerLaunch::Sender {
        key: key.clone(),
        simulate: false,
      })
      .await?;
    if sender_exit != 0 {
      warn!(sender_exit, "Sender failed, supervisor will escalate");
    }

    if let Err(e) = self
      .launcher
      .launch_detached(&WorkerLaunch::Supervisor { key: Some(key) })
      .await
    {
      warn!(error = %e, "Launching the supervisor failed");
    }
    Ok(MonitorOutcome::Transferred { sender_exit })
  }

  /// Dry-run: list what would be sent, start nothing else.
  async fn simulate(&self, check: u32) -> anyhow::Result<MonitorOutcome> {
    let kind = if rand::thread_rng().gen_bool(0.5) { "VAC" } else { "Game" };
    let message = format!("[DRY-RUN] {kind} ban detected (simulated) at check #{check}.");
    info!(check, kind, "Simulated ban");
    self.report(&message).await;

    let sender_exit = self
      .launcher
      .run_to_completion(&WorkerLaunch::Sender {
        key: TradeKey::generate(),
        simulate: true,
      })
      .await?;
    info!(sender_exit, "Simulation finished");
    Ok(MonitorOutcome::Simulated { check, sender_exit })
  }

  async fn report(&self, message: &str) {
    if let Err(e) = self.notifier.report(message).await {
      warn!(error = %e, "Status report failed");
    }
  }
}
