//! Shared utilities for relay
//!
//! This crate provides common functionality used across the relay workspace:
//! logging setup and the environment-driven [`Settings`] that carry model
//! credentials and service bindings into the orchestration crates.

pub mod config;
pub mod logging;

pub use config::{Settings, SettingsError};
pub use logging::{init_tracing, init_tracing_json};
