//! Receiver-Matcher Use Case - Accepting Exactly the Expected Offer
//!
//! Polls the receiving account's incoming offers and accepts the first
//! one that passes the security predicate for the trade key. Nothing
//! else is ever accepted; the loop runs until the accept succeeds.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::with_timeout;
use crate::config::TimingConfig;
use crate::domain::matcher::OfferMatcher;
use crate::domain::offer::{OfferId, TradeOffer};
use crate::ports::platform::TradePlatform;
use crate::ports::telemetry::{NoopTelemetry, Telemetry};

const ROLE: &str = "receiver";

/// Accepts the offer carrying the trade key.
pub struct ReceiverMatcher<P: TradePlatform> {
  platform: Arc<P>,
  telemetry: Arc<dyn Telemetry>,
  matcher: OfferMatcher,
  poll_interval: Duration,
  request_timeout: Duration,
}

impl<P: TradePlatform> ReceiverMatcher<P> {
  pub fn new(platform: Arc<P>, matcher: OfferMatcher, timing: &TimingConfig) -> Self {
    Self {
      platform,
      telemetry: Arc::new(NoopTelemetry),
      matcher,
      poll_interval: timing.poll_interval(),
      request_timeout: timing.request_timeout(),
    }
  }

  #[must_use]
  pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
    self.telemetry = telemetry;
    self
  }

  /// Poll until a matching offer has been accepted; returns its id.
  #[instrument(skip(self), fields(key = %self.matcher.key()))]
  pub async fn run(&self) -> OfferId {
    info!("Waiting for the keyed trade offer");
    loop {
      if let Some(offer_id) = self.poll_once().await {
        info!(%offer_id, "Trade offer accepted");
        return offer_id;
      }
      sleep(self.poll_interval).await;
    }
  }

  /// One poll: list, match, accept at most one offer.
  async fn poll_once(&self) -> Option<OfferId> {
    let offers = match with_timeout(self.request_timeout, self.platform.active_incoming_offers()).await {
      Ok(offers) => {
        self.telemetry.poll(ROLE, true);
        offers
      }
      Err(e) => {
        self.telemetry.poll(ROLE, false);
        warn!(error = %e, "Listing incoming offers failed");
        return None;
      }
    };

    let candidate = self.select(&offers)?;
    info!(offer_id = %candidate.id, items = candidate.items_to_receive.len(), "Matching offer found");

    match with_timeout(self.request_timeout, self.platform.accept_offer(candidate)).await {
      Ok(()) => {
        self.telemetry.accept_attempt(true);
        Some(candidate.id.clone())
      }
      Err(e) => {
        self.telemetry.accept_attempt(false);
        warn!(offer_id = %candidate.id, error = %e, "Accept failed, retrying next poll");
        None
      }
    }
  }

  /// First offer passing the predicate, in listing order.
  fn select<'a>(&self, offers: &'a [TradeOffer]) -> Option<&'a TradeOffer> {
    let found = self.matcher.first_match(offers, |offer, rejection| {
      debug!(offer_id = %offer.id, %rejection, "Offer ignored");
    });
    if found.is_none() && !offers.is_empty() {
      debug!(count = offers.len(), "No offer matched");
    }
    found
  }
}
