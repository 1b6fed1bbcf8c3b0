//! Supervisor Use Case - Watching the Receiving Account
//!
//! Polls the receiving account for an incoming offer and follows it
//! until it is accepted. When nothing shows up before the deadline it
//! escalates: first by launching a Sender, then by launching a
//! Receiver-Matcher for the key in flight.
//!
//! Flow per tick:
//! 1. AwaitingOffer: deadline passed → escalate, else list offers
//! 2. AwaitingAcceptance: deadline passed → fail, else read the offer
//! 3. Settled → exit 0; Failed → alert, hold, exit 1

use std::sync::Arc;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::{with_timeout, RoleError};
use crate::config::TimingConfig;
use crate::domain::offer::OfferState;
use crate::domain::trade_key::TradeKey;
use crate::domain::watch::{Escalation, Phase, WatchState};
use crate::ports::launcher::{WorkerLaunch, WorkerLauncher};
use crate::ports::notifier::{Alert, Notifier};
use crate::ports::platform::TradePlatform;
use crate::ports::telemetry::{NoopTelemetry, Telemetry};

const ROLE: &str = "supervisor";

/// Watchdog over one settlement attempt.
pub struct Supervisor<P: TradePlatform, L: WorkerLauncher, N: Notifier> {
  platform: Arc<P>,
  launcher: Arc<L>,
  notifier: Arc<N>,
  telemetry: Arc<dyn Telemetry>,
  timing: TimingConfig,
  /// Key of the offer currently expected, if any.
  key: Option<TradeKey>,
}

impl<P: TradePlatform, L: WorkerLauncher, N: Notifier> Supervisor<P, L, N> {
  /// Create a supervisor, optionally inheriting the key of an offer
  /// that is already on its way.
  pub fn new(
    platform: Arc<P>,
    launcher: Arc<L>,
    notifier: Arc<N>,
    timing: TimingConfig,
    key: Option<TradeKey>,
  ) -> Self {
    Self {
      platform,
      launcher,
      notifier,
      telemetry: Arc::new(NoopTelemetry),
      timing,
      key,
    }
  }

  /// Report polls, escalations and phases to `telemetry`.
  #[must_use]
  pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
    self.telemetry = telemetry;
    self
  }

  /// Key the supervisor currently expects.
  pub const fn current_key(&self) -> Option<&TradeKey> {
    self.key.as_ref()
  }

  /// Run until the tracked offer settles or the attempt fails.
  ///
  /// # Errors
  /// Returns `RoleError::SettlementFailed` after the operator alert has
  /// been raised and held.
  pub async fn run(&mut self) -> Result<(), RoleError> {
    let mut state = WatchState::new(Instant::now(), self.timing.watch_deadline());
    info!(
      key = ?self.key,
      deadline_secs = self.timing.watch_deadline_secs,
      "Watching for incoming trade offers"
    );
    self.telemetry.phase(state.phase());

    loop {
      self.tick(&mut state).await;
      self.telemetry.phase(state.phase());

      match state.phase() {
        Phase::Settled => {
          info!(offer_id = ?state.tracked_offer_id(), "Trade offer accepted");
          return Ok(());
        }
        Phase::Failed => return Err(self.raise_failure(&state).await),
        Phase::AwaitingOffer | Phase::AwaitingAcceptance => {
          sleep(self.timing.poll_interval()).await;
        }
      }
    }
  }

  async fn tick(&mut self, state: &mut WatchState) {
    let now = Instant::now();
    match state.phase() {
      Phase::AwaitingOffer => {
        if state.deadline_passed(now) {
          self.escalate(state).await;
        } else {
          self.poll_incoming(state, now).await;
        }
      }
      Phase::AwaitingAcceptance => {
        if state.deadline_passed(now) {
          warn!(offer_id = ?state.tracked_offer_id(), "Trade was not accepted in time");
          state.acceptance_timed_out();
        } else {
          self.poll_tracked(state).await;
        }
      }
      Phase::Settled | Phase::Failed => {}
    }
  }

  async fn poll_incoming(&self, state: &mut WatchState, now: Instant) {
    let offers = with_timeout(
      self.timing.request_timeout(),
      self.platform.active_incoming_offers(),
    )
    .await;

    match offers {
      Ok(offers) => {
        self.telemetry.poll(ROLE, true);
        match offers.iter().find(|o| o.state == OfferState::Active) {
          Some(offer) => {
            info!(offer_id = %offer.id, "Trade offer detected, watching for acceptance");
            state.offer_detected(offer.id.clone(), now);
          }
          None => debug!(attempts = state.attempt_count(), "Still waiting for a trade offer"),
        }
      }
      Err(e) => {
        self.telemetry.poll(ROLE, false);
        warn!(error = %e, "Listing incoming offers failed");
      }
    }
  }

  async fn poll_tracked(&self, state: &mut WatchState) {
    let Some(offer_id) = state.tracked_offer_id().map(ToString::to_string) else {
      return;
    };

    match with_timeout(self.timing.request_timeout(), self.platform.get_offer(&offer_id)).await {
      Ok(offer) => {
        self.telemetry.poll(ROLE, true);
        if state.observe_state(offer.state) == Phase::AwaitingAcceptance {
          info!(%offer_id, state = %offer.state, "Waiting for trade acceptance");
        }
      }
      Err(e) => {
        self.telemetry.poll(ROLE, false);
        warn!(error = %e, %offer_id, "Reading tracked offer failed");
      }
    }
  }

  /// Launch the next role, cool down, restart the watch.
  async fn escalate(&mut self, state: &mut WatchState) {
    let Some(planned) = state.escalate() else {
      return;
    };

    let launch = match (planned, &self.key) {
      (Escalation::LaunchReceiver, Some(key)) => WorkerLaunch::Receiver { key: key.clone() },
      (Escalation::LaunchReceiver, None) => {
        warn!("No trade key in flight, launching a sender instead of a matcher");
        self.sender_launch()
      }
      (Escalation::LaunchSender, _) => self.sender_launch(),
    };
    let kind = if matches!(launch, WorkerLaunch::Receiver { .. }) {
      Escalation::LaunchReceiver
    } else {
      Escalation::LaunchSender
    };
    self.telemetry.escalation(kind);

    info!(
      attempt = state.attempt_count(),
      role = launch.subcommand(),
      key = ?self.key,
      "No trade received before deadline, escalating"
    );
    if let Err(e) = with_timeout(
      self.timing.request_timeout(),
      self.launcher.launch_detached(&launch),
    )
    .await
    {
      warn!(error = %e, role = launch.subcommand(), "Escalation launch failed");
    }

    sleep(self.timing.escalation_cooldown()).await;
    state.restart_watch(Instant::now());
  }

  /// A sender always gets a fresh key; it becomes the key in flight.
  fn sender_launch(&mut self) -> WorkerLaunch {
    let key = TradeKey::generate();
    self.key = Some(key.clone());
    WorkerLaunch::Sender {
      key,
      simulate: false,
    }
  }

  /// Deliver the blocking alert, hold it on screen, and build the error.
  async fn raise_failure(&self, state: &WatchState) -> RoleError {
    let reason = state
      .failure()
      .map_or_else(|| "settlement failed".to_string(), ToString::to_string);
    let alert = Alert::new(reason.clone(), state.tracked_offer_id().map(ToString::to_string));

    self.telemetry.alert();
    if let Err(e) = self.notifier.alert(&alert).await {
      warn!(error = %e, "Alert delivery failed");
    }
    warn!(
      reason = %reason,
      hold_secs = self.timing.alert_hold_secs,
      "Settlement failed, holding alert before exit"
    );
    sleep(self.timing.alert_hold()).await;

    RoleError::SettlementFailed(reason)
  }
}
