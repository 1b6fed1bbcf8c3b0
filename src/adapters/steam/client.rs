//! Steam HTTP Client - Rate-limited Web API / Community Client
//!
//! Wraps reqwest with pacing, concurrency limits, retries and the
//! session cookies for all Steam Web API and community-site calls.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Longest response body quoted in an error.
const MAX_ERROR_BODY: usize = 300;

/// Steam answered 401/403: the web session is expired or revoked.
#[derive(Debug, thiserror::Error)]
#[error("Steam rejected the session ({status}) for {url}")]
pub struct SessionRejected {
  /// Response status.
  pub status: StatusCode,
  /// Endpoint, without query string.
  pub url: String,
}

impl SessionRejected {
  /// Whether `error` or anything in its chain is a rejected session.
  pub fn is_cause_of(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<Self>())
  }
}

/// Configuration for the Steam HTTP client.
#[derive(Debug, Clone)]
pub struct SteamClientConfig {
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors (idempotent calls only).
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
  /// Minimum spacing between any two requests.
  pub min_request_interval: Duration,
}

impl Default for SteamClientConfig {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      max_concurrent: 4,
      max_retries: 3,
      retry_base_delay: Duration::from_millis(500),
      min_request_interval: Duration::from_millis(250),
    }
  }
}

/// Rate-limited HTTP client shared by every Steam call.
pub struct SteamClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: SteamClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request pacing; `None` when the interval is zero.
  pacer: Option<DefaultDirectRateLimiter>,
  /// `Cookie` header of the current web session.
  cookies: RwLock<Option<String>>,
}

impl SteamClient {
  /// Create a new client.
  ///
  /// # Errors
  /// Returns error if the TLS backend cannot be initialized.
  pub fn new(config: SteamClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .user_agent(concat!("banshield/", env!("CARGO_PKG_VERSION")))
      .build()
      .context("Failed to build HTTP client")?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let pacer = Quota::with_period(config.min_request_interval).map(RateLimiter::direct);

    Ok(Self {
      http,
      config,
      semaphore,
      pacer,
      cookies: RwLock::new(None),
    })
  }

  /// Install the cookie header sent with every later request.
  pub async fn set_cookies(&self, header: String) {
    *self.cookies.write().await = Some(header);
  }

  /// GET and decode a JSON body. Retried on transient errors.
  pub async fn get_json<T: DeserializeOwned>(
    &self,
    url: &str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let request = self.http.get(url).query(query);
    let response = self.execute(request, url, true).await?;
    decode(response, url).await
  }

  /// GET a text body (profile pages). Retried on transient errors.
  pub async fn get_text(&self, url: &str) -> Result<String> {
    let request = self.http.get(url);
    let response = self.execute(request, url, true).await?;
    response
      .text()
      .await
      .map_err(reqwest::Error::without_url)
      .with_context(|| format!("Failed to read body from {url}"))
  }

  /// POST a form and decode the JSON answer.
  ///
  /// `idempotent = false` disables retries: a resent offer or accept
  /// could act twice.
  pub async fn post_form<T: DeserializeOwned>(
    &self,
    url: &str,
    form: &[(&str, String)],
    referer: Option<&str>,
    idempotent: bool,
  ) -> Result<T> {
    let mut request = self.http.post(url).form(form);
    if let Some(referer) = referer {
      request = request.header(REFERER, referer);
    }
    let response = self.execute(request, url, idempotent).await?;
    decode(response, url).await
  }

  /// Execute request with cookies, pacing and retries.
  async fn execute(&self, request: RequestBuilder, url: &str, idempotent: bool) -> Result<Response> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .context("Semaphore closed")?;

    let max_retries = if idempotent { self.config.max_retries } else { 0 };
    let mut last_error = None;

    for attempt in 0..=max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis(), "Retrying request");
        sleep(delay).await;
      }

      if let Some(pacer) = &self.pacer {
        pacer.until_ready().await;
      }

      let mut req = request
        .try_clone()
        .context("Failed to clone request")?;

      if let Some(cookies) = self.cookies.read().await.as_deref() {
        req = req.header(COOKIE, cookies);
      }

      match req.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => return Ok(response),
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(url, "Rate limited by Steam, backing off");
            sleep(Duration::from_secs(2)).await;
            last_error = Some(anyhow::anyhow!("Rate limited"));
          }
          StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(SessionRejected { status: response.status(), url: url.to_string() }.into());
          }
          status if status.is_server_error() && idempotent => {
            warn!(status = %status, url, "Server error, retrying");
            last_error = Some(anyhow::anyhow!("Server error: {status}"));
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Steam error {status}: {}", error_detail(&body));
          }
        },
        Err(e) => {
          // The query string can carry the access token.
          let e = e.without_url();
          warn!(error = %e, attempt, url, "Request failed");
          last_error = Some(e.into());
        }
      }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
  }
}

async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
  let body = response
    .text()
    .await
    .map_err(reqwest::Error::without_url)
    .with_context(|| format!("Failed to read body from {url}"))?;
  serde_json::from_str(&body)
    .with_context(|| format!("Unexpected response from {url}: {}", truncate(&body)))
}

/// Prefer Steam's `strError` over the raw body.
fn error_detail(body: &str) -> String {
  serde_json::from_str::<serde_json::Value>(body)
    .ok()
    .and_then(|v| v.get("strError").and_then(|e| e.as_str()).map(ToString::to_string))
    .unwrap_or_else(|| truncate(body).to_string())
}

fn truncate(body: &str) -> &str {
  match body.char_indices().nth(MAX_ERROR_BODY) {
    Some((idx, _)) => &body[..idx],
    None => body,
  }
}
