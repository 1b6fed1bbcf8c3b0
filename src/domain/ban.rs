//! Ban detection from a public profile page.
//!
//! Only a ban issued today ("0 day(s) since last ban") is actionable.
//! Older bans are tolerated so an account with history does not trigger
//! a transfer on every check.

/// Result of one profile check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanStatus {
    /// No ban marker on the page.
    Clean,
    /// A ban older than today; carries the page's wording.
    OldBan(String),
    /// A ban issued today; carries the page's wording.
    FreshBan(String),
}

impl BanStatus {
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::FreshBan(_))
    }
}

impl std::fmt::Display for BanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "[OK] NO BAN"),
            Self::OldBan(text) => write!(f, "[OK] NO BAN (old ban found: {text})"),
            Self::FreshBan(text) => write!(f, "[ALERT] BAN DETECTED: {text}"),
        }
    }
}

const SINCE_LAST_BAN: &str = "day(s) since last ban";

/// Classify a profile page body.
pub fn classify_profile(html: &str) -> BanStatus {
    let lower = html.to_lowercase();
    let Some(pos) = lower.find(SINCE_LAST_BAN) else {
        return BanStatus::Clean;
    };

    // The number preceding the marker; the stem may end in any character.
    let prefix = lower[..pos].trim_end();
    let stem = prefix.trim_end_matches(|c: char| c.is_ascii_digit());
    let days = &prefix[stem.len()..];
    let text = format!("{days} {SINCE_LAST_BAN}").trim().to_string();

    if days == "0" {
        BanStatus::FreshBan(text)
    } else {
        BanStatus::OldBan(text)
    }
}

/// Verdict over a burst of confirmation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckTally {
    /// Checks reporting a fresh ban.
    pub alerts: u32,
    /// Checks that failed to fetch the page.
    pub errors: u32,
    /// Checks performed.
    pub total: u32,
}

impl CheckTally {
    /// Record one check (`None` = fetch error).
    pub fn record(&mut self, status: Option<&BanStatus>) {
        self.total += 1;
        match status {
            Some(status) if status.is_fresh() => self.alerts += 1,
            Some(_) => {}
            None => self.errors += 1,
        }
    }

    /// Ban confirmed when at least `min_alerts` checks saw it.
    pub const fn confirmed(&self, min_alerts: u32) -> bool {
        self.alerts >= min_alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ban_detected() {
        let page = r#"<div class="profile_ban">1 VAC ban on record
            <span class="profile_ban_info">| 0 day(s) since last ban</span></div>"#;
        assert_eq!(
            classify_profile(page),
            BanStatus::FreshBan("0 day(s) since last ban".to_string())
        );
    }

    #[test]
    fn test_old_ban_tolerated() {
        let page = "Multiple VAC bans on record | 120 day(s) since last ban";
        let status = classify_profile(page);
        assert_eq!(status, BanStatus::OldBan("120 day(s) since last ban".to_string()));
        assert!(!status.is_fresh());
        // "10" must not be read as "0".
        assert!(!classify_profile("| 10 Day(s) since last ban").is_fresh());
    }

    #[test]
    fn test_non_ascii_before_day_count() {
        let page = "<span class=\"profile_ban_info\">|\u{a0}0 day(s) since last ban</span>";
        assert_eq!(
            classify_profile(page),
            BanStatus::FreshBan("0 day(s) since last ban".to_string())
        );
        let page = "Último ban: 45 day(s) since last ban";
        assert!(!classify_profile(page).is_fresh());
        assert!(!classify_profile("\u{2019}day(s) since last ban").is_fresh());
    }

    #[test]
    fn test_clean_profile() {
        assert_eq!(classify_profile("<html>No bans</html>"), BanStatus::Clean);
    }

    #[test]
    fn test_tally_threshold() {
        let mut tally = CheckTally::default();
        let fresh = BanStatus::FreshBan("0 day(s) since last ban".to_string());
        tally.record(Some(&BanStatus::Clean));
        tally.record(Some(&fresh));
        tally.record(None);
        assert!(!tally.confirmed(2));
        tally.record(Some(&fresh));
        assert!(tally.confirmed(2));
        assert_eq!(tally.total, 4);
        assert_eq!(tally.errors, 1);
    }
}
