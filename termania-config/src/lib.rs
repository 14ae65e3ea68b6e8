//! Configuration system for the termania control core.
//!
//! This crate provides configuration loading and default values for the
//! orchestrator. It includes:
//!
//! - The root `Config` type and its TOML loader
//! - Color parsing (`#RRGGBB` / `#RRGGBBAA`)
//! - Pane entry, text tap and LLM backend settings
//! - Session definitions with window/grid overrides

pub mod config;
pub mod defaults;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use config::{Config, FontConfig, GridConfig, SessionConfig, WindowConfig};
pub use error::ConfigError;
pub use types::{Color, ColorsConfig, LlmConfig, PaneEntryConfig, TextTapConfig};
