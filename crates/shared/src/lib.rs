//! Shared types, errors, and configuration for Medfin.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::{AppConfig, DownPaymentPolicy, FinancingConfig, LoggingConfig};
pub use error::AppError;
pub use telemetry::init_tracing;
