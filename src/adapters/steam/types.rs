//! Steam API Request/Response Types
//!
//! Serialization types for the Web API (`IEconService`,
//! `IAuthenticationService`) and the community site (inventory, trade
//! offers, mobile confirmations). Steam mixes strings and numbers for
//! ids and flags; the lenient helpers accept both.

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::offer::{Asset, OfferState, TradeOffer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum {
  Str(String),
  Num(u64),
}

fn lenient_u64<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
  match StrOrNum::deserialize(de)? {
    StrOrNum::Num(n) => Ok(n),
    StrOrNum::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
  }
}

fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
  Ok(match StrOrNum::deserialize(de)? {
    StrOrNum::Num(n) => n.to_string(),
    StrOrNum::Str(s) => s,
  })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
  Bool(bool),
  Num(u64),
}

fn lenient_bool<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
  Ok(match Option::<Flag>::deserialize(de)? {
    Some(Flag::Bool(b)) => b,
    Some(Flag::Num(n)) => n != 0,
    None => false,
  })
}

/// `{"response": ...}` wrapper used by every Web API method.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  pub response: T,
}

/// `IAuthenticationService/GenerateAccessTokenForApp` answer.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
  pub access_token: Option<String>,
}

/// `IEconService/GetTradeOffers` answer.
#[derive(Debug, Deserialize)]
pub struct TradeOffersResponse {
  #[serde(default)]
  pub trade_offers_received: Vec<ApiOffer>,
}

/// `IEconService/GetTradeOffer` answer.
#[derive(Debug, Deserialize)]
pub struct TradeOfferResponse {
  pub offer: Option<ApiOffer>,
}

/// Trade offer as the Web API reports it.
#[derive(Debug, Deserialize)]
pub struct ApiOffer {
  #[serde(deserialize_with = "lenient_string")]
  pub tradeofferid: String,
  /// 32-bit account id of the other side.
  pub accountid_other: Option<u32>,
  #[serde(default)]
  pub message: String,
  pub trade_offer_state: u8,
  #[serde(default)]
  pub items_to_give: Vec<ApiAsset>,
  #[serde(default)]
  pub items_to_receive: Vec<ApiAsset>,
}

impl TryFrom<ApiOffer> for TradeOffer {
  type Error = anyhow::Error;

  fn try_from(offer: ApiOffer) -> Result<Self, Self::Error> {
    let state = OfferState::try_from(offer.trade_offer_state)
      .with_context(|| format!("offer {}", offer.tradeofferid))?;
    Ok(Self {
      id: offer.tradeofferid,
      items_to_give: offer.items_to_give.into_iter().map(|a| a.into_asset(None)).collect(),
      items_to_receive: offer.items_to_receive.into_iter().map(|a| a.into_asset(None)).collect(),
      message: offer.message,
      state,
      partner: offer.accountid_other.map(|id| id.to_string()).unwrap_or_default(),
    })
  }
}

/// Item reference inside offers and inventory pages.
#[derive(Debug, Deserialize)]
pub struct ApiAsset {
  #[serde(deserialize_with = "lenient_u64")]
  pub appid: u64,
  #[serde(deserialize_with = "lenient_u64")]
  pub contextid: u64,
  #[serde(deserialize_with = "lenient_string")]
  pub assetid: String,
  #[serde(deserialize_with = "lenient_string")]
  pub classid: String,
  #[serde(default, deserialize_with = "lenient_string")]
  pub instanceid: String,
  #[serde(default = "one", deserialize_with = "lenient_u64")]
  pub amount: u64,
}

const fn one() -> u64 {
  1
}

impl ApiAsset {
  pub fn into_asset(self, name: Option<String>) -> Asset {
    Asset {
      app_id: u32::try_from(self.appid).unwrap_or(u32::MAX),
      context_id: self.contextid,
      asset_id: self.assetid,
      class_id: self.classid,
      instance_id: if self.instanceid.is_empty() { "0".to_string() } else { self.instanceid },
      amount: self.amount,
      name,
    }
  }
}

/// Item description from an inventory page.
#[derive(Debug, Deserialize)]
pub struct ApiDescription {
  #[serde(deserialize_with = "lenient_string")]
  pub classid: String,
  #[serde(default, deserialize_with = "lenient_string")]
  pub instanceid: String,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub tradable: bool,
  pub name: Option<String>,
  pub market_hash_name: Option<String>,
}

/// One page of `/inventory/{steamid}/{appid}/{contextid}`.
#[derive(Debug, Deserialize)]
pub struct InventoryPage {
  #[serde(default)]
  pub assets: Vec<ApiAsset>,
  #[serde(default)]
  pub descriptions: Vec<ApiDescription>,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub more_items: bool,
  pub last_assetid: Option<String>,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub success: bool,
}

impl InventoryPage {
  /// Tradable items of the page, named from their descriptions.
  pub fn into_tradable(self) -> Vec<Asset> {
    let descriptions: HashMap<(String, String), ApiDescription> = self
      .descriptions
      .into_iter()
      .map(|d| {
        let instance = if d.instanceid.is_empty() { "0".to_string() } else { d.instanceid.clone() };
        ((d.classid.clone(), instance), d)
      })
      .collect();

    self
      .assets
      .into_iter()
      .filter_map(|asset| {
        let instance = if asset.instanceid.is_empty() { "0" } else { asset.instanceid.as_str() };
        let description = descriptions.get(&(asset.classid.clone(), instance.to_string()))?;
        if !description.tradable {
          return None;
        }
        let name = description
          .market_hash_name
          .clone()
          .or_else(|| description.name.clone());
        Some(asset.into_asset(name))
      })
      .collect()
  }
}

/// `json_tradeoffer` form field of `/tradeoffer/new/send`.
#[derive(Debug, Serialize)]
pub struct JsonTradeOffer {
  pub newversion: bool,
  pub version: usize,
  pub me: TradeSide,
  pub them: TradeSide,
}

/// One side of a `JsonTradeOffer`.
#[derive(Debug, Default, Serialize)]
pub struct TradeSide {
  pub assets: Vec<OfferAssetRef>,
  pub currency: Vec<serde_json::Value>,
  pub ready: bool,
}

/// Item reference inside a `JsonTradeOffer`.
#[derive(Debug, Serialize)]
pub struct OfferAssetRef {
  pub appid: u32,
  pub contextid: String,
  pub amount: u64,
  pub assetid: String,
}

impl JsonTradeOffer {
  /// Offer giving `items` and asking for nothing.
  pub fn giving(items: &[Asset]) -> Self {
    let assets: Vec<OfferAssetRef> = items
      .iter()
      .map(|a| OfferAssetRef {
        appid: a.app_id,
        contextid: a.context_id.to_string(),
        amount: a.amount,
        assetid: a.asset_id.clone(),
      })
      .collect();
    Self {
      newversion: true,
      version: assets.len() + 1,
      me: TradeSide { assets, ..TradeSide::default() },
      them: TradeSide::default(),
    }
  }
}

/// `trade_offer_create_params` form field.
#[derive(Debug, Serialize)]
pub struct TradeOfferCreateParams {
  pub trade_offer_access_token: String,
}

/// Answer of `/tradeoffer/new/send`.
#[derive(Debug, Deserialize)]
pub struct SendOfferResponse {
  #[serde(default, deserialize_with = "opt_lenient_string")]
  pub tradeofferid: Option<String>,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub needs_mobile_confirmation: bool,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub needs_email_confirmation: bool,
  #[serde(rename = "strError")]
  pub str_error: Option<String>,
}

/// Answer of `/tradeoffer/{id}/accept`.
#[derive(Debug, Deserialize)]
pub struct AcceptOfferResponse {
  #[serde(default, deserialize_with = "opt_lenient_string")]
  pub tradeid: Option<String>,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub needs_mobile_confirmation: bool,
  #[serde(rename = "strError")]
  pub str_error: Option<String>,
}

fn opt_lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
  Ok(Option::<StrOrNum>::deserialize(de)?.map(|v| match v {
    StrOrNum::Num(n) => n.to_string(),
    StrOrNum::Str(s) => s,
  }))
}

/// Answer of `/mobileconf/getlist`.
#[derive(Debug, Deserialize)]
pub struct ConfirmationList {
  #[serde(default, deserialize_with = "lenient_bool")]
  pub success: bool,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub needauth: bool,
  #[serde(default)]
  pub conf: Vec<ApiConfirmation>,
  pub message: Option<String>,
}

/// One pending mobile confirmation.
#[derive(Debug, Deserialize)]
pub struct ApiConfirmation {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  #[serde(deserialize_with = "lenient_string")]
  pub nonce: String,
  /// Offer id for trade confirmations.
  #[serde(deserialize_with = "lenient_string")]
  pub creator_id: String,
}

/// Answer of `/mobileconf/ajaxop`.
#[derive(Debug, Deserialize)]
pub struct ConfirmationOpResponse {
  #[serde(default, deserialize_with = "lenient_bool")]
  pub success: bool,
  pub message: Option<String>,
}
