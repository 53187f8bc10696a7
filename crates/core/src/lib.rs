//! Core functionality for the Mailwatch mailbox sensor.
//!
//! This crate provides the configuration model, error types, logging setup
//! and shared labels used across the Mailwatch workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{Config, DetectorConfig, PowerConfig, TelemetryConfig};
pub use error::{CoreError, CoreResult};
pub use types::MailboxState;
