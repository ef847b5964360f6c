//! Shared error model and configuration for codeless.
//!
//! This crate is the foundation depended on by all other codeless crates.
//! It provides:
//! - [`CodelessError`] — the unified error type
//! - Configuration ([`AppConfig`], config loading, API key resolution)

pub mod config;
pub mod error;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GenerationConfig, MODEL_NAME_ENV, OpenAiConfig, apply_env_overrides, config_dir,
    config_file_path, detect_python_version, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{CodelessError, Result};
