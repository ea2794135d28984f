//! Docchat Common - Shared configuration, error types, and logging for docchat.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment overrides)
//! - Error types and their HTTP mapping
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Config, CorsConfig, DocumentConfig, LlmConfig, NetworkConfig, ObservabilityConfig,
    SecretsConfig,
};
pub use error::{Error, Result};
