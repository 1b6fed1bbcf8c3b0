//! Trade key - the single-use correlation secret.
//!
//! The Sender embeds the key as the offer message; the Receiver-Matcher
//! gets the same key through its launch and only accepts an offer that
//! carries it. The raw value never reaches a log line: `Display` and
//! `Debug` both print the masked form.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Minimum accepted key length.
pub const MIN_TRADE_KEY_LEN: usize = 16;

/// Random bytes drawn per generated key (32 base64url chars).
const KEY_ENTROPY_BYTES: usize = 24;

/// Invalid trade key input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// No key was supplied.
    #[error("trade key is missing")]
    Missing,
    /// Key shorter than `MIN_TRADE_KEY_LEN`.
    #[error("trade key is too short ({len} chars, need at least {MIN_TRADE_KEY_LEN})")]
    TooShort { len: usize },
    /// Key contains characters outside the URL-safe base64 alphabet.
    #[error("trade key contains characters outside [A-Za-z0-9_-]")]
    InvalidCharacters,
}

/// Single-use, URL-safe secret correlating one offer with one matcher.
#[derive(Clone, PartialEq, Eq)]
pub struct TradeKey(String);

impl TradeKey {
    /// Generate a fresh key from OS randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_ENTROPY_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Validate externally supplied key material.
    ///
    /// # Errors
    /// Returns `KeyError` when the key is empty, too short, or not URL-safe.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(KeyError::Missing);
        }
        if raw.len() < MIN_TRADE_KEY_LEN {
            return Err(KeyError::TooShort { len: raw.len() });
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(KeyError::InvalidCharacters);
        }
        Ok(Self(raw.to_string()))
    }

    /// Parse an optional key, treating `None` as missing.
    ///
    /// # Errors
    /// Returns `KeyError::Missing` for `None`, otherwise as `parse`.
    pub fn from_optional(raw: Option<&str>) -> Result<Self, KeyError> {
        raw.map_or(Err(KeyError::Missing), Self::parse)
    }

    /// Raw key material. Only for embedding in an offer or a launch.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Exact, constant-time comparison against an offer message.
    pub fn matches(&self, message: &str) -> bool {
        self.0.as_bytes().ct_eq(message.as_bytes()).into()
    }

    /// First four and last four characters, for logs.
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

impl std::fmt::Display for TradeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.masked())
    }
}

impl std::fmt::Debug for TradeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TradeKey({})", self.masked())
    }
}

/// Mask a secret down to its first and last four characters.
///
/// Secrets of eight characters or fewer are hidden entirely.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "…".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_is_url_safe_and_long() {
        let key = TradeKey::generate();
        assert_eq!(key.expose().len(), 32);
        assert!(TradeKey::parse(key.expose()).is_ok());
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = TradeKey::generate();
        let b = TradeKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_rejects_short_and_missing() {
        assert_eq!(TradeKey::parse(""), Err(KeyError::Missing));
        assert_eq!(TradeKey::parse("   "), Err(KeyError::Missing));
        assert_eq!(
            TradeKey::parse("abc123"),
            Err(KeyError::TooShort { len: 6 })
        );
        assert_eq!(TradeKey::from_optional(None), Err(KeyError::Missing));
        assert!(TradeKey::parse("0123456789abcdef").is_ok());
    }

    #[test]
    fn test_parse_rejects_non_url_safe() {
        assert_eq!(
            TradeKey::parse("abcd+efgh/ijkl=mnop"),
            Err(KeyError::InvalidCharacters)
        );
    }

    #[test]
    fn test_matches_is_exact() {
        let key = TradeKey::parse("Ab12cD34eF56gH78iJ90wXyZ").unwrap();
        assert!(key.matches("Ab12cD34eF56gH78iJ90wXyZ"));
        assert!(!key.matches("ab12cD34eF56gH78iJ90wXyZ"));
        assert!(!key.matches("Ab12cD34eF56gH78iJ90wXy"));
        assert!(!key.matches("Ab12cD34eF56gH78iJ90wXyZ "));
        assert!(!key.matches(""));
    }

    #[test]
    fn test_display_never_leaks_key() {
        let key = TradeKey::parse("Ab12cD34eF56gH78iJ90wXyZ").unwrap();
        assert_eq!(key.to_string(), "Ab12…wXyZ");
        assert_eq!(format!("{key:?}"), "TradeKey(Ab12…wXyZ)");
        assert!(!format!("{key} {key:?}").contains(key.expose()));
    }

    #[test]
    fn test_mask_short_secret() {
        assert_eq!(mask("short"), "…");
        assert_eq!(mask("123456789"), "1234…6789");
    }
}
