//! Core generation pipeline for codeless.
//!
//! This crate ties together template discovery, fingerprinting, the
//! generation backend, and artifact merging into one incremental workflow
//! ([`ensure_generated`]), plus the loader and failure diagnosis built on
//! top of it.

pub mod diagnose;
pub mod loader;
pub mod merge;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod prompt;
pub mod template;

pub use diagnose::{FailureReport, SourceExcerpt, diagnose};
pub use loader::{LoadedModule, ModuleLoader, ResolutionTable};
pub use metadata::{GenerationMetadata, fingerprint};
pub use naming::{ArtifactPaths, RESERVED_ALIAS, RESERVED_IMPORT, RESERVED_SEGMENT};
pub use pipeline::{
    ArtifactStatus, GenerateConfig, GenerateResult, Outcome, ProgressReporter, SilentProgress,
    artifact_status, ensure_all, ensure_generated, read_artifact,
};
pub use template::{TemplateFunction, discover_templates, module_name_from_path};
