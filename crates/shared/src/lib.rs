//! Shared types and configuration for Club Ledger.
//!
//! This crate provides common types used across all other crates:
//! - Integer minor-unit amounts and organization currencies
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, LedgerSettings};
