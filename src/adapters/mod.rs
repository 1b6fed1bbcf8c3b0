//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, child processes, file I/O).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `steam`: Web API / community client, Steam Guard codes, trade platform
//! - `profile`: public profile probe for the ban monitor
//! - `launcher`: re-invokes this binary to start worker roles
//! - `notify`: console banner and Telegram notifications
//! - `metrics`: Prometheus metrics export and health checks

pub mod launcher;
pub mod metrics;
pub mod notify;
pub mod profile;
pub mod steam;
