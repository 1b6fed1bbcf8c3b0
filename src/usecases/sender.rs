//! Sender Use Case - Moving Every Tradable Item in One Offer
//!
//! Collects the tradable items of every selected inventory, puts them
//! into a single offer tagged with the trade key, and confirms it.
//!
//! Flow:
//! 1. Enumerate partitions concurrently (a failing partition adds nothing)
//! 2. Nothing found → done; simulate-only → list and stop
//! 3. Submit the offer (failure is fatal)
//! 4. Confirm out-of-band under a bounded backoff (exhaustion is fatal)
//! 5. Auto-accept: launch the matcher, then follow the offer to a close

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use super::{with_timeout, RoleError};
use crate::config::AppConfig;
use crate::domain::offer::{Asset, OfferState};
use crate::domain::partition::InventoryPartition;
use crate::domain::retry::RetryPolicy;
use crate::domain::trade_key::TradeKey;
use crate::ports::launcher::{WorkerLaunch, WorkerLauncher};
use crate::ports::platform::{OfferDraft, TradePlatform};
use crate::ports::telemetry::{NoopTelemetry, Telemetry};

const ROLE: &str = "sender";

/// How a sender run ended. Every variant exits 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
  /// No tradable items in the selected inventories.
  NothingToSend,
  /// Simulate-only: the items that would have been sent.
  Simulated(Vec<Asset>),
  /// Offer sent and confirmed; left for the counterparty.
  Sent {
    /// Platform offer id.
    offer_id: String,
  },
  /// Offer followed until the counterparty accepted it.
  Accepted {
    /// Platform offer id.
    offer_id: String,
  },
  /// Offer closed without acceptance (declined, canceled, expired, ...).
  Closed {
    /// Platform offer id.
    offer_id: String,
    /// Final state.
    state: OfferState,
  },
}

/// Builds, submits and confirms the transfer offer.
pub struct Sender<P: TradePlatform, L: WorkerLauncher> {
  platform: Arc<P>,
  launcher: Arc<L>,
  telemetry: Arc<dyn Telemetry>,
  key: TradeKey,
  trade_url: String,
  partitions: Vec<InventoryPartition>,
  simulate: bool,
  auto_accept: bool,
  poll_interval: Duration,
  request_timeout: Duration,
  confirmation: RetryPolicy,
}

impl<P: TradePlatform, L: WorkerLauncher> Sender<P, L> {
  /// Create a sender for `key` from the loaded configuration.
  ///
  /// # Errors
  /// Returns `RoleError::Config` for an invalid inventory selection.
  pub fn new(
    platform: Arc<P>,
    launcher: Arc<L>,
    config: &AppConfig,
    key: TradeKey,
  ) -> Result<Self, RoleError> {
    let partitions = config
      .transfer
      .partitions()
      .map_err(|e| RoleError::Config(format!("{e:#}")))?;

    Ok(Self {
      platform,
      launcher,
      telemetry: Arc::new(NoopTelemetry),
      key,
      trade_url: config.transfer.trade_url.clone(),
      partitions,
      simulate: config.bot.dry_run,
      auto_accept: config.transfer.auto_accept,
      poll_interval: config.timing.poll_interval(),
      request_timeout: config.timing.request_timeout(),
      confirmation: config.confirmation_policy(),
    })
  }

  #[must_use]
  pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
    self.telemetry = telemetry;
    self
  }

  /// Run the sender once.
  ///
  /// # Errors
  /// Returns `RoleError` when the offer cannot be submitted or confirmed.
  #[instrument(skip(self), fields(key = %self.key))]
  pub async fn run(&self) -> Result<SendOutcome, RoleError> {
    let items = self.collect_items().await;

    if items.is_empty() {
      info!("No tradable items found");
      return Ok(SendOutcome::NothingToSend);
    }

    if self.simulate {
      info!(
        count = items.len(),
        "Simulation only. On a ban these items would be sent to the backup account"
      );
      for item in &items {
        info!(name = item.label(), app_id = item.app_id, asset_id = %item.asset_id, "Would send");
      }
      return Ok(SendOutcome::Simulated(items));
    }

    if self.trade_url.trim().is_empty() {
      return Err(RoleError::Config("transfer.trade_url is not set".to_string()));
    }

    let item_count = items.len();
    let mut draft = OfferDraft::new(self.trade_url.clone());
    draft.set_message(&self.key).add_items_to_give(items);

    let sent = with_timeout(self.request_timeout, self.platform.send_offer(&draft))
      .await
      .map_err(|e| RoleError::Submission(format!("{e:#}")))?;
    self.telemetry.offer_sent();
    info!(
      offer_id = %sent.id,
      items = item_count,
      needs_confirmation = sent.needs_confirmation,
      "Trade offer sent"
    );

    if sent.needs_confirmation {
      self.confirm(&sent.id).await?;
    }

    if !self.auto_accept {
      info!(offer_id = %sent.id, "Auto-accept disabled, leaving offer to the receiver");
      return Ok(SendOutcome::Sent { offer_id: sent.id });
    }

    let launch = WorkerLaunch::Receiver {
      key: self.key.clone(),
    };
    if let Err(e) = with_timeout(self.request_timeout, self.launcher.launch_detached(&launch)).await {
      warn!(error = %e, "Launching the matcher failed, offer must be accepted manually");
    }

    Ok(self.follow(sent.id).await)
  }

  /// Tradable items of every partition, in partition order.
  async fn collect_items(&self) -> Vec<Asset> {
    let lookups = self.partitions.iter().map(|&partition| async move {
      let result = with_timeout(self.request_timeout, self.platform.inventory(partition)).await;
      (partition, result)
    });

    let mut items = Vec::new();
    for (partition, result) in join_all(lookups).await {
      match result {
        Ok(found) => {
          info!(%partition, count = found.len(), "Inventory loaded");
          items.extend(found);
        }
        Err(e) => warn!(%partition, error = %e, "Inventory unavailable, skipping"),
      }
    }
    items
  }

  /// Confirm `offer_id`, backing off between failures.
  async fn confirm(&self, offer_id: &str) -> Result<(), RoleError> {
    let mut failures = 0u32;
    loop {
      match with_timeout(self.request_timeout, self.platform.confirm_offer(offer_id)).await {
        Ok(()) => {
          self.telemetry.confirmation_attempt(true);
          info!(offer_id, attempts = failures + 1, "Mobile confirmation successful");
          return Ok(());
        }
        Err(e) => {
          self.telemetry.confirmation_attempt(false);
          failures += 1;
          let Some(delay) = self.confirmation.delay_after(failures) else {
            return Err(RoleError::ConfirmationExhausted {
              offer_id: offer_id.to_string(),
              attempts: failures,
              last_error: format!("{e:#}"),
            });
          };
          warn!(
            offer_id,
            attempt = failures,
            max_attempts = self.confirmation.max_attempts,
            retry_in_secs = delay.as_secs_f64(),
            error = %e,
            "Mobile confirmation failed"
          );
          sleep(delay).await;
        }
      }
    }
  }

  /// Poll the offer until it is accepted or closes.
  async fn follow(&self, offer_id: String) -> SendOutcome {
    loop {
      match with_timeout(self.request_timeout, self.platform.get_offer(&offer_id)).await {
        Ok(offer) => {
          self.telemetry.poll(ROLE, true);
          if offer.state == OfferState::Accepted {
            info!(%offer_id, "Trade offer accepted");
            return SendOutcome::Accepted { offer_id };
          }
          if offer.state.is_terminal() {
            info!(%offer_id, state = %offer.state, "Trade offer closed");
            return SendOutcome::Closed {
              offer_id,
              state: offer.state,
            };
          }
          info!(%offer_id, state = %offer.state, "Trade offer still pending");
        }
        Err(e) => {
          self.telemetry.poll(ROLE, false);
          warn!(%offer_id, error = %e, "Trade offer could not be queried");
        }
      }
      sleep(self.poll_interval).await;
    }
  }
}
