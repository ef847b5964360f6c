//! Application configuration for codeless.
//!
//! User config lives at `~/.codeless/codeless.toml`.
//! Environment variables override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CodelessError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "codeless.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".codeless";

/// Env var that overrides `openai.model_name`.
pub const MODEL_NAME_ENV: &str = "OPENAI_MODEL_NAME";

/// Interpreter asked for its version when none is configured.
const PYTHON_INTERPRETER: &str = "python3";

const FALLBACK_PYTHON_VERSION: &str = "3";

// ---------------------------------------------------------------------------
// Config structs (matching codeless.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Prompt and artifact settings.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model used for generation.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model_name: default_model_name(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model_name() -> String {
    "gpt-3.5-turbo".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    120
}

/// `[generation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Python version generated code must be compatible with.
    /// Unset means "whatever `python3` is installed".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
}

impl GenerationConfig {
    /// The configured version, else the local interpreter's, else `"3"`.
    pub fn resolve_python_version(&self) -> String {
        self.resolve_python_version_with(detect_python_version)
    }

    fn resolve_python_version_with(&self, detect: impl FnOnce() -> Option<String>) -> String {
        self.python_version
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(detect)
            .unwrap_or_else(|| FALLBACK_PYTHON_VERSION.to_string())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.codeless/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CodelessError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.codeless/codeless.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk and apply env overrides.
/// Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CodelessError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CodelessError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(model) = lookup(MODEL_NAME_ENV).filter(|v| !v.is_empty()) {
        tracing::debug!(%model, "model name overridden from environment");
        config.openai.model_name = model;
    }
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CodelessError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CodelessError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CodelessError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Version of the local `python3`, if one is on `PATH`.
pub fn detect_python_version() -> Option<String> {
    let output = std::process::Command::new(PYTHON_INTERPRETER)
        .arg("--version")
        .output()
        .ok()?;

    if !output.status.success() {
        tracing::debug!(status = ?output.status, "python3 --version failed");
        return None;
    }

    // Old interpreters print the banner on stderr.
    let banner = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let version = parse_python_version(&banner);
    tracing::debug!(?version, "detected python version");
    version
}

/// `"Python 3.12.1\n"` → `"3.12.1"`.
fn parse_python_version(banner: &str) -> Option<String> {
    let version = banner.trim().strip_prefix("Python")?.trim();
    let numeric = !version.is_empty()
        && version
            .split('.')
            .all(|part| part.starts_with(|c: char| c.is_ascii_digit()));
    numeric.then(|| version.to_string())
}

/// Read the API key from the env var named in the config.
///
/// Fails before any generation is attempted if the variable is unset or empty.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    resolve_api_key_with(config, |name| std::env::var(name).ok())
}

fn resolve_api_key_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match lookup(var_name) {
        Some(val) if !val.is_empty() => Ok(val),
        _ => Err(CodelessError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable."
        ))),
    }
}
