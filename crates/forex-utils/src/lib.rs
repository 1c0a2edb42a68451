//! Shared utilities for forex-agent-rs
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError, env_var, env_var_or};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
