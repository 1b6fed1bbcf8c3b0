//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `TradePlatform`: Session, offers, inventory, confirmations
//! - `WorkerLauncher`: Starting the other roles
//! - `Notifier`: Operator alerts and status reports
//! - `ProfileProbe`: Ban status of the watched profile
//! - `Telemetry`: Counters and phase gauge

pub mod launcher;
pub mod notifier;
pub mod platform;
pub mod profile;
pub mod telemetry;
