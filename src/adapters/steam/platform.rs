//! Steam Trading Platform — `TradePlatform` over the Web API and
//! community site.
//!
//! Session flow:
//! 1. `authenticate` exchanges the refresh token for a web access token
//! 2. the access token feeds Web API calls (`IEconService`)
//! 3. `steamLoginSecure` + `sessionid` cookies feed community calls
//!    (inventory, send/accept, mobile confirmations)
//! 4. a call Steam answers with 401/403 renews the session from the
//!    stored credentials and runs once more

use std::future::Future;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::RngCore;
use reqwest::Url;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::client::{SessionRejected, SteamClient};
use super::guard::{confirmation_key, device_id};
use super::types::{
    AcceptOfferResponse, AccessTokenResponse, ApiEnvelope, ConfirmationList,
    ConfirmationOpResponse, InventoryPage, JsonTradeOffer, SendOfferResponse,
    TradeOfferCreateParams, TradeOfferResponse, TradeOffersResponse,
};
use crate::domain::offer::{Asset, SteamId, TradeOffer};
use crate::domain::partition::InventoryPartition;
use crate::ports::platform::{
    AccountCredentials, GuardCode, OfferDraft, SentOffer, SessionInfo, TradePlatform,
};

/// Items requested per inventory page.
const INVENTORY_PAGE_SIZE: u32 = 2000;

/// Safety stop for inventory pagination.
const MAX_INVENTORY_PAGES: usize = 50;

/// Parsed receiver trade URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeUrl {
    /// Receiving account.
    pub partner: SteamId,
    /// Trade access token, required for non-friends.
    pub token: Option<String>,
}

impl TradeUrl {
    /// Parse `https://steamcommunity.com/tradeoffer/new/?partner=..&token=..`.
    ///
    /// # Errors
    /// Returns error if the URL or its `partner` parameter is malformed.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).with_context(|| format!("Invalid trade URL {raw:?}"))?;
        let mut partner = None;
        let mut token = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "partner" => partner = Some(value.into_owned()),
                "token" if !value.is_empty() => token = Some(value.into_owned()),
                _ => {}
            }
        }
        let partner: SteamId = partner
            .context("Trade URL has no partner parameter")?
            .parse()
            .context("Trade URL partner is not an account id")?;
        Ok(Self { partner, token })
    }
}

/// Established web session, with the credentials that renew it.
struct WebSession {
    credentials: AccountCredentials,
    access_token: String,
    session_id: String,
}

/// `TradePlatform` backed by Steam.
pub struct SteamPlatform {
    client: SteamClient,
    web_api_url: String,
    community_url: String,
    session: RwLock<Option<WebSession>>,
}

impl SteamPlatform {
    /// Create an unauthenticated platform client.
    pub fn new(client: SteamClient, web_api_url: &str, community_url: &str) -> Self {
        Self {
            client,
            web_api_url: web_api_url.trim_end_matches('/').to_string(),
            community_url: community_url.trim_end_matches('/').to_string(),
            session: RwLock::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .context("not authenticated")
    }

    async fn session_parts(&self) -> Result<(SteamId, String, Option<String>)> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| {
                (
                    s.credentials.steam_id,
                    s.session_id.clone(),
                    s.credentials.identity_secret.clone(),
                )
            })
            .context("not authenticated")
    }

    /// Exchange the refresh token for a web access token and install
    /// the session cookies.
    async fn establish(&self, credentials: &AccountCredentials) -> Result<()> {
        let url = format!(
            "{}/IAuthenticationService/GenerateAccessTokenForApp/v1/",
            self.web_api_url
        );
        let form = [
            ("refresh_token", credentials.refresh_token.clone()),
            ("steamid", credentials.steam_id.to_string()),
        ];
        let envelope: ApiEnvelope<AccessTokenResponse> =
            self.client.post_form(&url, &form, None, true).await?;
        let access_token = envelope
            .response
            .access_token
            .filter(|t| !t.is_empty())
            .context("Steam refused the refresh token")?;

        let session_id = random_session_id();
        self.client
            .set_cookies(format!(
                "steamLoginSecure={}%7C%7C{access_token}; sessionid={session_id}",
                credentials.steam_id
            ))
            .await;

        *self.session.write().await = Some(WebSession {
            credentials: credentials.clone(),
            access_token,
            session_id,
        });
        Ok(())
    }

    /// Run `call`; if Steam rejected the session, renew it and run
    /// `call` once more.
    async fn renewing<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match call().await {
            Err(e) if SessionRejected::is_cause_of(&e) => {
                let credentials = self
                    .session
                    .read()
                    .await
                    .as_ref()
                    .map(|s| s.credentials.clone())
                    .context("not authenticated")?;
                warn!(error = %e, account = %credentials.account_name, "Web session rejected, renewing");
                self.establish(&credentials)
                    .await
                    .context("Session renewal failed")?;
                info!(steam_id = %credentials.steam_id, "Web session renewed");
                call().await
            }
            result => result,
        }
    }

    async fn fetch_incoming_offers(&self) -> Result<Vec<TradeOffer>> {
        let url = format!("{}/IEconService/GetTradeOffers/v1/", self.web_api_url);
        let query = [
            ("access_token", self.access_token().await?),
            ("get_received_offers", "1".to_string()),
            ("active_only", "1".to_string()),
        ];
        let envelope: ApiEnvelope<TradeOffersResponse> =
            self.client.get_json(&url, &query).await?;

        let mut offers = Vec::with_capacity(envelope.response.trade_offers_received.len());
        for raw in envelope.response.trade_offers_received {
            match TradeOffer::try_from(raw) {
                Ok(offer) => offers.push(offer),
                Err(e) => warn!(error = %e, "Skipping offer with unknown state"),
            }
        }
        Ok(offers)
    }

    async fn fetch_offer(&self, offer_id: &str) -> Result<TradeOffer> {
        let url = format!("{}/IEconService/GetTradeOffer/v1/", self.web_api_url);
        let query = [
            ("access_token", self.access_token().await?),
            ("tradeofferid", offer_id.to_string()),
        ];
        let envelope: ApiEnvelope<TradeOfferResponse> =
            self.client.get_json(&url, &query).await?;
        envelope
            .response
            .offer
            .with_context(|| format!("Offer {offer_id} not found"))?
            .try_into()
    }

    async fn post_offer(&self, draft: &OfferDraft) -> Result<SentOffer> {
        let (_, session_id, _) = self.session_parts().await?;
        let target = TradeUrl::parse(&draft.trade_url)?;

        let json_offer = serde_json::to_string(&JsonTradeOffer::giving(&draft.items_to_give))
            .context("Failed to encode offer")?;
        let params = serde_json::to_string(&TradeOfferCreateParams {
            trade_offer_access_token: target.token.clone().unwrap_or_default(),
        })
        .context("Failed to encode offer params")?;

        let form = [
            ("sessionid", session_id),
            ("serverid", "1".to_string()),
            ("partner", target.partner.to_string()),
            ("tradeoffermessage", draft.message.clone()),
            ("json_tradeoffer", json_offer),
            ("captcha", String::new()),
            ("trade_offer_create_params", params),
        ];
        let url = format!("{}/tradeoffer/new/send", self.community_url);
        let response: SendOfferResponse = self
            .client
            .post_form(&url, &form, Some(&draft.trade_url), false)
            .await?;

        if let Some(error) = response.str_error {
            anyhow::bail!("Steam refused the offer: {error}");
        }
        let id = response
            .tradeofferid
            .context("Steam returned no offer id")?;
        Ok(SentOffer {
            id,
            needs_confirmation: response.needs_mobile_confirmation || response.needs_email_confirmation,
        })
    }

    async fn post_accept(&self, offer: &TradeOffer) -> Result<AcceptOfferResponse> {
        let (_, session_id, _) = self.session_parts().await?;
        let partner = offer
            .counterparty()
            .with_context(|| format!("Offer {} has no usable partner", offer.id))?;

        let form = [
            ("sessionid", session_id),
            ("serverid", "1".to_string()),
            ("tradeofferid", offer.id.clone()),
            ("partner", partner.to_string()),
            ("captcha", String::new()),
        ];
        let url = format!("{}/tradeoffer/{}/accept", self.community_url, offer.id);
        let referer = format!("{}/tradeoffer/{}/", self.community_url, offer.id);
        let response: AcceptOfferResponse = self
            .client
            .post_form(&url, &form, Some(&referer), false)
            .await?;

        if let Some(error) = response.str_error {
            anyhow::bail!("Steam refused the accept: {error}");
        }
        Ok(response)
    }

    async fn fetch_inventory(&self, partition: InventoryPartition) -> Result<Vec<Asset>> {
        let (steam_id, _, _) = self.session_parts().await?;
        let url = format!(
            "{}/inventory/{steam_id}/{}/{}",
            self.community_url, partition.app_id, partition.context_id
        );

        let mut items = Vec::new();
        let mut start: Option<String> = None;
        for _ in 0..MAX_INVENTORY_PAGES {
            let mut query = vec![
                ("l", "english".to_string()),
                ("count", INVENTORY_PAGE_SIZE.to_string()),
            ];
            if let Some(start) = &start {
                query.push(("start_assetid", start.clone()));
            }
            let page: InventoryPage = self
                .client
                .get_json(&url, &query)
                .await
                .with_context(|| format!("Inventory {partition} unavailable"))?;
            anyhow::ensure!(page.success, "Inventory {partition} request was not successful");

            let more = page.more_items;
            let next = page.last_assetid.clone();
            items.extend(page.into_tradable());

            match (more, next) {
                (true, Some(next)) => start = Some(next),
                _ => return Ok(items),
            }
        }
        warn!(%partition, pages = MAX_INVENTORY_PAGES, "Inventory pagination stopped early");
        Ok(items)
    }

    async fn post_confirmation(&self, offer_id: &str) -> Result<()> {
        let (steam_id, _, identity_secret) = self.session_parts().await?;
        let identity_secret = identity_secret.context("No identity secret configured")?;

        let list = self.confirmation_list(steam_id, &identity_secret).await?;
        let pending = list
            .conf
            .into_iter()
            .find(|c| c.creator_id == offer_id)
            .with_context(|| format!("No pending confirmation for offer {offer_id}"))?;

        let time = chrono::Utc::now().timestamp();
        let mut query = confirmation_query(steam_id, &identity_secret, time, "allow")?;
        query.push(("op", "allow".to_string()));
        query.push(("cid", pending.id));
        query.push(("ck", pending.nonce));

        let url = format!("{}/mobileconf/ajaxop", self.community_url);
        let response: ConfirmationOpResponse = self.client.get_json(&url, &query).await?;
        anyhow::ensure!(
            response.success,
            "Confirmation refused: {}",
            response.message.as_deref().unwrap_or("no message")
        );
        Ok(())
    }

    async fn confirmation_list(
        &self,
        steam_id: SteamId,
        identity_secret: &str,
    ) -> Result<ConfirmationList> {
        let time = chrono::Utc::now().timestamp();
        let query = confirmation_query(steam_id, identity_secret, time, "list")?;
        let url = format!("{}/mobileconf/getlist", self.community_url);
        let list: ConfirmationList = self.client.get_json(&url, &query).await?;
        if list.needauth {
            anyhow::bail!("Session is not authorized for mobile confirmations");
        }
        anyhow::ensure!(
            list.success,
            "Confirmation list refused: {}",
            list.message.as_deref().unwrap_or("no message")
        );
        Ok(list)
    }
}

fn confirmation_query(
    steam_id: SteamId,
    identity_secret: &str,
    time: i64,
    tag: &str,
) -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("p", device_id(steam_id)),
        ("a", steam_id.to_string()),
        ("k", confirmation_key(identity_secret, time, tag)?),
        ("t", time.to_string()),
        ("m", "react".to_string()),
        ("tag", tag.to_string()),
    ])
}

fn random_session_id() -> String {
    let mut bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl TradePlatform for SteamPlatform {
    #[instrument(skip_all, fields(account = %credentials.account_name))]
    async fn authenticate(
        &self,
        credentials: &AccountCredentials,
        _code: &GuardCode,
    ) -> Result<SessionInfo> {
        // The refresh token already carries the second factor.
        debug!("Minting web session from refresh token");
        self.establish(credentials).await?;

        info!(steam_id = %credentials.steam_id, "Web session established");
        Ok(SessionInfo {
            steam_id: credentials.steam_id,
            account_name: credentials.account_name.clone(),
        })
    }

    async fn active_incoming_offers(&self) -> Result<Vec<TradeOffer>> {
        self.renewing(|| self.fetch_incoming_offers()).await
    }

    async fn get_offer(&self, offer_id: &str) -> Result<TradeOffer> {
        self.renewing(|| self.fetch_offer(offer_id)).await
    }

    #[instrument(skip_all, fields(items = draft.items_to_give.len()))]
    async fn send_offer(&self, draft: &OfferDraft) -> Result<SentOffer> {
        // A rejected session means Steam never created the offer.
        self.renewing(|| self.post_offer(draft)).await
    }

    #[instrument(skip_all, fields(offer_id = %offer.id))]
    async fn accept_offer(&self, offer: &TradeOffer) -> Result<()> {
        let response = self.renewing(|| self.post_accept(offer)).await?;
        if response.needs_mobile_confirmation {
            let (_, _, identity_secret) = self.session_parts().await?;
            anyhow::ensure!(
                identity_secret.is_some(),
                "Accept needs a mobile confirmation but no identity secret is configured"
            );
            self.confirm_offer(&offer.id).await?;
        }
        debug!(trade_id = ?response.tradeid, "Offer accepted");
        Ok(())
    }

    async fn inventory(&self, partition: InventoryPartition) -> Result<Vec<Asset>> {
        self.renewing(|| self.fetch_inventory(partition)).await
    }

    #[instrument(skip(self))]
    async fn confirm_offer(&self, offer_id: &str) -> Result<()> {
        self.renewing(|| self.post_confirmation(offer_id)).await?;
        info!(offer_id, "Offer confirmed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::adapters::steam::client::SteamClientConfig;

    /// Steam stand-in that mints `token-1`, `token-2`, ... and only
    /// honours tokens numbered `accepts_from` or later.
    #[derive(Clone)]
    struct ExpiringSteam {
        minted: Arc<AtomicUsize>,
        accepts_from: usize,
    }

    async fn mint(State(steam): State<ExpiringSteam>) -> Json<serde_json::Value> {
        let n = steam.minted.fetch_add(1, Ordering::SeqCst) + 1;
        Json(serde_json::json!({ "response": { "access_token": format!("token-{n}") } }))
    }

    async fn offers(
        State(steam): State<ExpiringSteam>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        let n: usize = query
            .get("access_token")
            .and_then(|t| t.strip_prefix("token-"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        if n >= steam.accepts_from {
            Json(serde_json::json!({ "response": { "trade_offers_received": [] } })).into_response()
        } else {
            StatusCode::UNAUTHORIZED.into_response()
        }
    }

    async fn platform_against(accepts_from: usize) -> (SteamPlatform, Arc<AtomicUsize>) {
        let steam = ExpiringSteam { minted: Arc::new(AtomicUsize::new(0)), accepts_from };
        let minted = steam.minted.clone();
        let app = Router::new()
            .route("/IAuthenticationService/GenerateAccessTokenForApp/v1/", post(mint))
            .route("/IEconService/GetTradeOffers/v1/", get(offers))
            .with_state(steam);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = SteamClient::new(SteamClientConfig {
            max_retries: 0,
            min_request_interval: Duration::ZERO,
            ..SteamClientConfig::default()
        })
        .unwrap();
        let platform = SteamPlatform::new(client, &base, &base);
        platform
            .authenticate(&credentials(), &GuardCode("00000".to_string()))
            .await
            .unwrap();
        (platform, minted)
    }

    fn credentials() -> AccountCredentials {
        AccountCredentials {
            account_name: "bank".to_string(),
            steam_id: SteamId::from_account_id(1234),
            refresh_token: "refresh".to_string(),
            shared_secret: "cnOgv/KdpLoP6Nbh0GMkXkPXALQ=".to_string(),
            identity_secret: None,
        }
    }

    #[test]
    fn test_trade_url_parsed() {
        let url = TradeUrl::parse(
            "https://steamcommunity.com/tradeoffer/new/?partner=39734272&token=AbCdEf12",
        )
        .unwrap();
        assert_eq!(url.partner.as_u64(), 76_561_198_000_000_000);
        assert_eq!(url.token.as_deref(), Some("AbCdEf12"));
    }

    #[test]
    fn test_trade_url_without_token() {
        let url = TradeUrl::parse("https://steamcommunity.com/tradeoffer/new/?partner=39734272")
            .unwrap();
        assert!(url.token.is_none());
    }

    #[test]
    fn test_trade_url_rejects_garbage() {
        assert!(TradeUrl::parse("not a url").is_err());
        assert!(TradeUrl::parse("https://steamcommunity.com/tradeoffer/new/?token=x").is_err());
        assert!(TradeUrl::parse("https://steamcommunity.com/tradeoffer/new/?partner=abc").is_err());
    }

    #[test]
    fn test_session_id_is_hex() {
        let id = random_session_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, random_session_id());
    }

    #[tokio::test]
    async fn test_calls_before_authenticate_fail() {
        let client = SteamClient::new(SteamClientConfig::default()).unwrap();
        let platform = SteamPlatform::new(client, "http://127.0.0.1:9", "http://127.0.0.1:9");
        let err = platform.active_incoming_offers().await.unwrap_err();
        assert!(err.to_string().contains("not authenticated"));
        assert!(platform.inventory(InventoryPartition::CS2).await.is_err());
        assert!(platform.confirm_offer("1").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_session_renewed_and_retried() {
        let (platform, minted) = platform_against(2).await;
        assert_eq!(minted.load(Ordering::SeqCst), 1);

        let offers = platform.active_incoming_offers().await.unwrap();
        assert!(offers.is_empty());
        assert_eq!(minted.load(Ordering::SeqCst), 2);

        // The renewed token keeps working without another exchange.
        platform.active_incoming_offers().await.unwrap();
        assert_eq!(minted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_session_renewed_only_once_per_call() {
        let (platform, minted) = platform_against(usize::MAX).await;

        let err = platform.active_incoming_offers().await.unwrap_err();
        assert!(SessionRejected::is_cause_of(&err));
        assert_eq!(minted.load(Ordering::SeqCst), 2);
    }
}
