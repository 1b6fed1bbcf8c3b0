//! Steam Guard — One-time Codes and Confirmation Keys
//!
//! Both derive from HMAC-SHA1 over a big-endian timestamp:
//! - login codes use the shared secret and 30 s time steps, truncated
//!   to five characters of Steam's code alphabet
//! - confirmation keys use the identity secret, the exact Unix time and
//!   a tag naming the operation (`list`, `allow`), base64 encoded

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::domain::offer::SteamId;
use crate::ports::platform::GuardCode;

type HmacSha1 = Hmac<Sha1>;

/// Characters a login code is built from.
const CODE_ALPHABET: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";

/// Length of a login code.
const CODE_LEN: usize = 5;

/// Seconds per login code window.
const CODE_PERIOD: i64 = 30;

fn hmac_sha1(secret_b64: &str, message: &[u8]) -> Result<[u8; 20]> {
    let key = STANDARD
        .decode(secret_b64.trim())
        .context("Guard secret is not valid base64")?;
    let mut mac = HmacSha1::new_from_slice(&key).context("Invalid HMAC key")?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Login code for `unix_time`.
///
/// # Errors
/// Returns error if the shared secret is not base64.
pub fn auth_code(shared_secret: &str, unix_time: i64) -> Result<GuardCode> {
    let step = unix_time.div_euclid(CODE_PERIOD);
    let digest = hmac_sha1(shared_secret, &step.to_be_bytes())?;

    let offset = usize::from(digest[19] & 0x0F);
    let mut full = u32::from_be_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]) & 0x7FFF_FFFF;

    let radix = CODE_ALPHABET.len() as u32;
    let mut code = String::with_capacity(CODE_LEN);
    for _ in 0..CODE_LEN {
        code.push(char::from(CODE_ALPHABET[(full % radix) as usize]));
        full /= radix;
    }
    Ok(GuardCode(code))
}

/// Login code for the current time.
///
/// # Errors
/// Returns error if the shared secret is not base64.
pub fn current_auth_code(shared_secret: &str) -> Result<GuardCode> {
    auth_code(shared_secret, chrono::Utc::now().timestamp())
}

/// Confirmation key for `tag` at `unix_time`.
///
/// # Errors
/// Returns error if the identity secret is not base64.
pub fn confirmation_key(identity_secret: &str, unix_time: i64, tag: &str) -> Result<String> {
    let mut message = Vec::with_capacity(8 + tag.len());
    message.extend_from_slice(&unix_time.to_be_bytes());
    message.extend_from_slice(tag.as_bytes());
    let digest = hmac_sha1(identity_secret, &message)?;
    Ok(STANDARD.encode(digest))
}

/// Mobile device id Steam expects alongside confirmation calls.
pub fn device_id(steam_id: SteamId) -> String {
    let digest = Sha1::digest(steam_id.to_string().as_bytes());
    let uuid = Uuid::from_slice(&digest[..16]).unwrap_or_default();
    format!("android:{uuid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "cnOgv/KdpLoP6Nbh0GMkXkPXALQ=";

    #[test]
    fn test_auth_code_reference_vectors() {
        assert_eq!(auth_code(SECRET, 1_600_000_000).unwrap().0, "H6G3P");
        assert_eq!(auth_code(SECRET, 0).unwrap().0, "W3J46");
    }

    #[test]
    fn test_auth_code_stable_within_window() {
        let a = auth_code(SECRET, 1_600_000_029).unwrap();
        let b = auth_code(SECRET, 1_600_000_030).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0, "HKCH5");
        assert_ne!(a, auth_code(SECRET, 1_600_000_000).unwrap());
    }

    #[test]
    fn test_auth_code_alphabet() {
        let code = auth_code(SECRET, 1_234_567_890).unwrap().0;
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_confirmation_key_reference_vectors() {
        assert_eq!(
            confirmation_key(SECRET, 1_600_000_000, "conf").unwrap(),
            "BC2NgWevGICPmDom0k0/EyoHDLQ="
        );
        assert_eq!(
            confirmation_key(SECRET, 1_600_000_000, "allow").unwrap(),
            "FBLyXhsXoQ8CrLErKL8fdCWvq1w="
        );
    }

    #[test]
    fn test_invalid_secret_is_error() {
        assert!(auth_code("%%%", 0).is_err());
        assert!(confirmation_key("%%%", 0, "list").is_err());
    }

    #[test]
    fn test_device_id_format() {
        let id = device_id(SteamId::new(76_561_198_000_000_000));
        assert_eq!(id, "android:5c9df5a2-d7de-1e2c-8fc8-766523ca130f");
    }
}
