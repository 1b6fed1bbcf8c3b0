//! Console alert banner.
//!
//! Alerts are printed as a red full-width block on stderr so they stand
//! out from the JSON log stream on stdout.

use std::io::Write;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::ports::notifier::{Alert, Notifier};

const RED_BOLD: &str = "\x1b[1;97;41m";
const RESET: &str = "\x1b[0m";
const WIDTH: usize = 72;

/// Alert sink writing to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAlert;

/// Render the banner lines for `alert` (without colour codes).
pub fn banner_lines(alert: &Alert) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        center("!!! TRANSFER ALERT !!!"),
        String::new(),
        center(&alert.reason),
    ];
    if let Some(offer_id) = &alert.offer_id {
        lines.push(center(&format!("offer {offer_id}")));
    }
    lines.push(center(&alert.raised_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
    lines.push(String::new());
    lines
}

fn center(text: &str) -> String {
    let len = text.chars().count();
    if len >= WIDTH {
        return text.to_string();
    }
    let left = (WIDTH - len) / 2;
    format!("{}{text}{}", " ".repeat(left), " ".repeat(WIDTH - len - left))
}

#[async_trait]
impl Notifier for ConsoleAlert {
    async fn alert(&self, alert: &Alert) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        for line in banner_lines(alert) {
            writeln!(stderr, "{RED_BOLD}{line:<WIDTH$}{RESET}")?;
        }
        stderr.flush()?;
        Ok(())
    }

    async fn report(&self, message: &str) -> Result<()> {
        info!(report = message, "Status");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_carries_reason_and_offer() {
        let alert = Alert::new("offer 42 was Declined (7)", Some("42".to_string()));
        let lines = banner_lines(&alert);
        assert!(lines.iter().any(|l| l.contains("Declined")));
        assert!(lines.iter().any(|l| l.trim() == "offer 42"));
        assert!(lines.iter().all(|l| l.is_empty() || l.chars().count() >= WIDTH));
    }
}
