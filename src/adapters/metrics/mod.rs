//! Metrics and Monitoring Adapters
//!
//! Prometheus counters behind the `Telemetry` port and the axum server
//! for /live, /ready and /metrics.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use self::prometheus::SettlementMetrics;
