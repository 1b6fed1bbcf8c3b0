//! Trade offer domain types.
//!
//! Mirrors the platform's offer records as read-only values. Nothing
//! here mutates an offer: state changes happen on the platform in
//! response to send/accept/confirm calls and are observed by polling.
//!
//! Exposes:
//! - `OfferState` with the platform's fixed numeric discriminants
//! - `TradeOffer` plus counterparty identity resolution
//! - `Asset` (one inventory item) and `SteamId`

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────

/// Platform-assigned offer identifier.
pub type OfferId = String;

/// Offset between a 32-bit account id and its 64-bit individual SteamID.
pub const STEAM_ID64_BASE: u64 = 76_561_197_960_265_728;

/// 64-bit account identity on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SteamId(u64);

impl SteamId {
    /// Wrap a raw SteamID64.
    pub const fn new(id64: u64) -> Self {
        Self(id64)
    }

    /// Build the individual-account SteamID64 for a 32-bit account id.
    pub const fn from_account_id(account_id: u32) -> Self {
        Self(STEAM_ID64_BASE + account_id as u64)
    }

    /// Raw 64-bit value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// 32-bit account id (the `partner` field of trade URLs).
    pub const fn account_id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

impl std::fmt::Display for SteamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SteamId {
    type Err = IdentityError;

    /// Accepts either a SteamID64 or a bare 32-bit account id.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let value: u64 = trimmed
            .parse()
            .map_err(|_| IdentityError::Malformed(trimmed.to_string()))?;

        if value == 0 {
            return Err(IdentityError::Malformed(trimmed.to_string()));
        }

        match u32::try_from(value) {
            Ok(account_id) => Ok(Self::from_account_id(account_id)),
            Err(_) if value > STEAM_ID64_BASE => Ok(Self(value)),
            Err(_) => Err(IdentityError::Malformed(trimmed.to_string())),
        }
    }
}

/// Counterparty identity could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The platform did not report a counterparty at all.
    #[error("offer has no counterparty reference")]
    Missing,
    /// The reference is not a valid account id or SteamID64.
    #[error("malformed counterparty reference: {0:?}")]
    Malformed(String),
}

// ────────────────────────────────────────────
// Offer state
// ────────────────────────────────────────────

/// Lifecycle state of an offer, with the platform's fixed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OfferState {
    Invalid = 1,
    Active = 2,
    Accepted = 3,
    Countered = 4,
    Expired = 5,
    Canceled = 6,
    Declined = 7,
    InvalidItems = 8,
    NeedsConfirmation = 9,
    CanceledBySecondFactor = 10,
    InEscrow = 11,
}

/// Numeric offer state outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown offer state value {0}")]
pub struct UnknownOfferState(pub u8);

impl TryFrom<u8> for OfferState {
    type Error = UnknownOfferState;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Invalid,
            2 => Self::Active,
            3 => Self::Accepted,
            4 => Self::Countered,
            5 => Self::Expired,
            6 => Self::Canceled,
            7 => Self::Declined,
            8 => Self::InvalidItems,
            9 => Self::NeedsConfirmation,
            10 => Self::CanceledBySecondFactor,
            11 => Self::InEscrow,
            other => return Err(UnknownOfferState(other)),
        })
    }
}

impl From<OfferState> for u8 {
    fn from(state: OfferState) -> Self {
        state as Self
    }
}

impl OfferState {
    /// Human-readable name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Active => "Active",
            Self::Accepted => "Accepted",
            Self::Countered => "Countered",
            Self::Expired => "Expired",
            Self::Canceled => "Canceled",
            Self::Declined => "Declined",
            Self::InvalidItems => "InvalidItems",
            Self::NeedsConfirmation => "NeedsConfirmation",
            Self::CanceledBySecondFactor => "CanceledBySecondFactor",
            Self::InEscrow => "InEscrow",
        }
    }

    /// Declined or canceled: the offer is closed without a transfer.
    pub const fn is_closed_negative(self) -> bool {
        matches!(self, Self::Declined | Self::Canceled)
    }

    /// No further platform transition is possible from this state.
    pub const fn is_terminal(self) -> bool {
        !matches!(
            self,
            Self::Active | Self::NeedsConfirmation | Self::InEscrow
        )
    }
}

impl std::fmt::Display for OfferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), *self as u8)
    }
}

// ────────────────────────────────────────────
// Items and offers
// ────────────────────────────────────────────

/// One tradable inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Application namespace the item belongs to.
    pub app_id: u32,
    /// Inventory context inside the application.
    pub context_id: u64,
    /// Platform asset id.
    pub asset_id: String,
    /// Description class.
    pub class_id: String,
    /// Description instance.
    pub instance_id: String,
    /// Stack size.
    pub amount: u64,
    /// Display name, when descriptions were fetched.
    pub name: Option<String>,
}

impl Asset {
    /// Best available label for listings.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.class_id)
    }
}

/// A trade offer as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    /// Platform-assigned id.
    pub id: OfferId,
    /// Items the local account would give up.
    pub items_to_give: Vec<Asset>,
    /// Items the local account would receive.
    pub items_to_receive: Vec<Asset>,
    /// Free-text message attached by the creator.
    pub message: String,
    /// Current lifecycle state.
    pub state: OfferState,
    /// Raw counterparty reference as delivered by the platform.
    pub partner: String,
}

impl TradeOffer {
    /// Resolve the counterparty reference into a SteamID.
    ///
    /// # Errors
    /// Returns `IdentityError` when the reference is missing or malformed.
    pub fn counterparty(&self) -> Result<SteamId, IdentityError> {
        if self.partner.trim().is_empty() {
            return Err(IdentityError::Missing);
        }
        self.partner.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_discriminants_are_fixed() {
        assert_eq!(u8::from(OfferState::Invalid), 1);
        assert_eq!(u8::from(OfferState::Active), 2);
        assert_eq!(u8::from(OfferState::Accepted), 3);
        assert_eq!(u8::from(OfferState::Declined), 7);
        assert_eq!(u8::from(OfferState::InEscrow), 11);
        for value in 1..=11u8 {
            let state = OfferState::try_from(value).unwrap();
            assert_eq!(u8::from(state), value);
        }
    }

    #[test]
    fn test_unknown_state_rejected() {
        assert_eq!(OfferState::try_from(0), Err(UnknownOfferState(0)));
        assert_eq!(OfferState::try_from(12), Err(UnknownOfferState(12)));
    }

    #[test]
    fn test_state_deserializes_from_number() {
        let state: OfferState = serde_json::from_str("3").unwrap();
        assert_eq!(state, OfferState::Accepted);
        assert!(serde_json::from_str::<OfferState>("42").is_err());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!OfferState::Active.is_terminal());
        assert!(!OfferState::NeedsConfirmation.is_terminal());
        assert!(OfferState::Accepted.is_terminal());
        assert!(OfferState::Declined.is_closed_negative());
        assert!(OfferState::Canceled.is_closed_negative());
        assert!(!OfferState::Expired.is_closed_negative());
    }

    #[test]
    fn test_steam_id_from_account_id() {
        let id = SteamId::from_account_id(39_734_272);
        assert_eq!(id.as_u64(), 76_561_198_000_000_000);
        assert_eq!(id.account_id(), 39_734_272);
        assert_eq!("39734272".parse::<SteamId>().unwrap(), id);
        assert_eq!("76561198000000000".parse::<SteamId>().unwrap(), id);
    }

    #[test]
    fn test_counterparty_resolution_failures() {
        let mut offer = TradeOffer {
            id: "1".to_string(),
            items_to_give: vec![],
            items_to_receive: vec![],
            message: String::new(),
            state: OfferState::Active,
            partner: String::new(),
        };
        assert_eq!(offer.counterparty(), Err(IdentityError::Missing));

        offer.partner = "not-a-steam-id".to_string();
        assert!(matches!(
            offer.counterparty(),
            Err(IdentityError::Malformed(_))
        ));

        offer.partner = "0".to_string();
        assert!(offer.counterparty().is_err());
    }
}
