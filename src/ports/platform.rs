//! Trading Platform Port - Offer, Inventory and Session Interface
//!
//! Defines the contract the roles need from the trading platform.
//! Everything behind it (HTTP endpoints, cookies, token renewal) is an
//! adapter concern.
//!
//! Key design decisions:
//! - Every call may fail transiently; callers decide what is fatal
//! - Offers are read back from the platform on every poll, never cached
//! - Listing order of `active_incoming_offers` is the platform's order

use async_trait::async_trait;

use crate::domain::offer::{Asset, SteamId, TradeOffer};
use crate::domain::partition::InventoryPartition;
use crate::domain::trade_key::{mask, TradeKey};

/// Login material for one account.
///
/// Secrets are redacted from `Debug`.
#[derive(Clone)]
pub struct AccountCredentials {
  /// Platform login name.
  pub account_name: String,
  /// Account identity.
  pub steam_id: SteamId,
  /// Long-lived token used to mint web sessions.
  pub refresh_token: String,
  /// Base64 secret behind the one-time login codes.
  pub shared_secret: String,
  /// Base64 secret behind out-of-band confirmations (sender only).
  pub identity_secret: Option<String>,
}

impl std::fmt::Debug for AccountCredentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AccountCredentials")
      .field("account_name", &self.account_name)
      .field("steam_id", &self.steam_id)
      .field("refresh_token", &mask(&self.refresh_token))
      .field("shared_secret", &"<redacted>")
      .field("identity_secret", &self.identity_secret.as_ref().map(|_| "<redacted>"))
      .finish()
  }
}

/// Time-based one-time login code.
///
/// Only interactive credential logins consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardCode(pub String);

/// Established session summary.
#[derive(Debug, Clone)]
pub struct SessionInfo {
  /// Account the session belongs to.
  pub steam_id: SteamId,
  /// Login name, for logs.
  pub account_name: String,
}

/// Outgoing offer under construction.
#[derive(Debug, Clone)]
pub struct OfferDraft {
  /// Destination trade URL (partner + access token).
  pub trade_url: String,
  /// Message shown with the offer.
  pub message: String,
  /// Items the local account gives.
  pub items_to_give: Vec<Asset>,
}

impl OfferDraft {
  /// Start an empty offer to `trade_url`.
  pub fn new(trade_url: impl Into<String>) -> Self {
    Self {
      trade_url: trade_url.into(),
      message: String::new(),
      items_to_give: Vec::new(),
    }
  }

  /// Tag the offer with a trade key.
  pub fn set_message(&mut self, key: &TradeKey) -> &mut Self {
    self.message = key.expose().to_string();
    self
  }

  /// Attach outgoing items.
  pub fn add_items_to_give(&mut self, items: impl IntoIterator<Item = Asset>) -> &mut Self {
    self.items_to_give.extend(items);
    self
  }
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SentOffer {
  /// Platform-assigned offer id.
  pub id: String,
  /// Whether the platform waits for an out-of-band confirmation.
  pub needs_confirmation: bool,
}

/// Trait for trading-platform clients.
///
/// Implementors keep the session established by `authenticate`
/// and use it for every later call.
#[async_trait]
pub trait TradePlatform: Send + Sync + 'static {
  /// Establish an authenticated session.
  ///
  /// `code` is the current one-time code for logins that need a second
  /// factor. Sessions minted from a refresh token already carry that
  /// factor and may ignore it.
  ///
  /// Implementors renew an expired session themselves, from the same
  /// `credentials`, so later calls do not fail on token expiry alone.
  ///
  /// # Errors
  /// Returns error if the platform refuses the credentials.
  async fn authenticate(
    &self,
    credentials: &AccountCredentials,
    code: &GuardCode,
  ) -> anyhow::Result<SessionInfo>;

  /// Active offers received by the local account, in platform order.
  async fn active_incoming_offers(&self) -> anyhow::Result<Vec<TradeOffer>>;

  /// Current record of one offer.
  async fn get_offer(&self, offer_id: &str) -> anyhow::Result<TradeOffer>;

  /// Submit an outgoing offer.
  async fn send_offer(&self, draft: &OfferDraft) -> anyhow::Result<SentOffer>;

  /// Accept an incoming offer.
  async fn accept_offer(&self, offer: &TradeOffer) -> anyhow::Result<()>;

  /// Tradable items of one inventory partition.
  async fn inventory(&self, partition: InventoryPartition) -> anyhow::Result<Vec<Asset>>;

  /// Out-of-band confirmation of an offer the local account sent.
  async fn confirm_offer(&self, offer_id: &str) -> anyhow::Result<()>;
}
