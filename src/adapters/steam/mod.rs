//! Steam Adapters
//!
//! Web API + community-site client, Steam Guard code generation and
//! the `TradePlatform` implementation built on them.

pub mod client;
pub mod guard;
pub mod platform;
pub mod types;

pub use client::{SteamClient, SteamClientConfig};
pub use platform::{SteamPlatform, TradeUrl};
