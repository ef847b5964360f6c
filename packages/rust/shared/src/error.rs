//! Error types for codeless.
//!
//! Library crates use [`CodelessError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all codeless operations.
#[derive(Debug, thiserror::Error)]
pub enum CodelessError {
    /// Configuration loading or validation error (missing credentials, bad TOML).
    #[error("config error: {message}")]
    Config { message: String },

    /// Source text ended while a documentation block was still open.
    #[error("malformed source: {quote} block opened on line {line} is never closed")]
    MalformedSource { quote: String, line: usize },

    /// The generation backend failed or returned an unusable reply.
    #[error("generation backend error: {0}")]
    GenerationBackend(String),

    /// The artifact's metadata block is not a JSON object of fingerprints.
    #[error("invalid generation metadata: {message}")]
    Metadata { message: String },

    /// The requested function is not a top-level function of the template module.
    #[error("template function '{name}' not found in {path:?}")]
    TemplateNotFound { name: String, path: PathBuf },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CodelessError>;

impl CodelessError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-source error for a block opened by `quote` on `line` (1-based).
    pub fn malformed(quote: impl Into<String>, line: usize) -> Self {
        Self::MalformedSource {
            quote: quote.into(),
            line,
        }
    }

    /// Create a backend error from any displayable message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::GenerationBackend(msg.into())
    }

    /// Create a metadata error from any displayable message.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CodelessError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CodelessError::malformed("\"\"\"", 3);
        assert_eq!(
            err.to_string(),
            "malformed source: \"\"\" block opened on line 3 is never closed"
        );

        let err = CodelessError::backend("HTTP 500");
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn template_not_found_names_function() {
        let err = CodelessError::TemplateNotFound {
            name: "add".into(),
            path: PathBuf::from("pkg/math.py"),
        };
        let msg = err.to_string();
        assert!(msg.contains("'add'"));
        assert!(msg.contains("math.py"));
    }
}
