//! Shared types, errors, and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Money type with fixed decimal precision
//! - Typed IDs for type-safe entity references
//! - Error kinds shared by every layer
//! - Configuration management
//! - Email delivery for expense notifications

pub mod config;
pub mod email;
pub mod error;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, EmailConfig, LedgerConfig};
pub use email::{EmailError, EmailService};
pub use error::ErrorKind;
