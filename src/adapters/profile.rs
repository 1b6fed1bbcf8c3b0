//! Public profile probe.
//!
//! Fetches the watched account's community profile in English and
//! classifies the ban banner. No session is needed: the page is public.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::steam::SteamClient;
use crate::domain::ban::{classify_profile, BanStatus};
use crate::ports::profile::ProfileProbe;

/// `ProfileProbe` over a public profile URL.
pub struct SteamProfileProbe {
    client: SteamClient,
    url: String,
}

impl SteamProfileProbe {
    pub fn new(client: SteamClient, profile_url: &str) -> Self {
        Self {
            client,
            url: english_url(profile_url),
        }
    }
}

/// Force the English page so the ban wording is predictable.
fn english_url(profile_url: &str) -> String {
    let trimmed = profile_url.trim();
    if trimmed.contains("l=english") {
        trimmed.to_string()
    } else if trimmed.contains('?') {
        format!("{trimmed}&l=english")
    } else {
        format!("{trimmed}?l=english")
    }
}

#[async_trait]
impl ProfileProbe for SteamProfileProbe {
    async fn check(&self) -> Result<BanStatus> {
        let page = self.client.get_text(&self.url).await?;
        let status = classify_profile(&page);
        debug!(%status, bytes = page.len(), "Profile checked");
        Ok(status)
    }
}
