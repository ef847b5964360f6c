//! Incremental generation: template → cached or freshly generated artifact.
//!
//! 1. Strip the trigger line and fingerprint the template
//! 2. Derive the artifact location and read the previous artifact
//! 3. Reuse it when the fingerprint matches and the function is present
//! 4. Otherwise ask the backend, clean the reply, and merge it in
//! 5. Write the merged artifact in one step

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use codeless_llm::{LanguageModel, Message};
use codeless_segment::Module;
use codeless_shared::{CodelessError, Result};

use crate::merge::merge_artifact;
use crate::metadata::{GenerationMetadata, fingerprint};
use crate::naming::ArtifactPaths;
use crate::prompt::{build_generation_prompt, clean_reply};
use crate::template::TemplateFunction;

/// Options for [`ensure_generated`].
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Python version the generated code must be compatible with.
    pub python_version: String,
}

/// How a template was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Artifact already held an up-to-date implementation; nothing was written.
    CacheHit,
    /// The backend was called and the artifact rewritten.
    Generated,
}

/// Result of [`ensure_generated`].
#[derive(Debug, Clone)]
pub struct GenerateResult {
    /// Artifact location and logical name.
    pub artifact: ArtifactPaths,
    /// Template function name.
    pub function: String,
    /// Fingerprint of the template text now recorded in the artifact.
    pub fingerprint: String,
    pub outcome: Outcome,
}

/// Freshness of a template's artifact, checked without calling the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Fingerprint matches and the function is present.
    Fresh,
    /// Something was generated before but the template has changed since.
    Stale,
    /// Never generated.
    Missing,
}

/// Progress callback for generation runs.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per template when it is settled.
    fn done(&self, result: &GenerateResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &GenerateResult) {}
}

/// Make sure the artifact holds an implementation of `template` that was
/// generated from its current text.
///
/// Nothing is written unless the backend call and the merge both succeed.
#[instrument(skip_all, fields(function = %template.name, module = %template.module_name))]
pub async fn ensure_generated<L: LanguageModel>(
    llm: &L,
    template: &TemplateFunction,
    config: &GenerateConfig,
    progress: &dyn ProgressReporter,
) -> Result<GenerateResult> {
    let name = template.name.as_str();
    let template_text = template.stripped_source();
    let current = fingerprint(&template_text);
    let artifact = ArtifactPaths::derive(&template.module_path, &template.module_name);

    progress.phase("Reading artifact");
    let (previous, mut metadata) = read_artifact(&artifact.path)?;

    if metadata.get(name) == Some(current.as_str()) && previous.function(name).is_some() {
        info!(artifact = %artifact.name, "template unchanged, reusing artifact");
        let result = GenerateResult {
            artifact,
            function: name.to_string(),
            fingerprint: current,
            outcome: Outcome::CacheHit,
        };
        progress.done(&result);
        return Ok(result);
    }

    debug!(
        previous = metadata.get(name).unwrap_or("-"),
        current = %current,
        "template changed or missing from artifact"
    );
    metadata.insert(name, current.as_str());

    progress.phase("Generating implementation");
    let prompt = build_generation_prompt(&template_text, &config.python_version);
    let reply = llm.prompt(&[Message::user(prompt)]).await?;

    let generated = clean_reply(&reply.content);
    if generated.trim().is_empty() {
        return Err(CodelessError::backend("reply contained no code"));
    }

    progress.phase("Merging artifact");
    let merged = merge_artifact(&previous, &metadata, name, &generated)?;

    // The next run has to be able to read what we write.
    let reparsed = codeless_segment::parse(&merged)
        .map_err(|e| CodelessError::backend(format!("reply does not form a valid artifact: {e}")))?;
    if reparsed.function(name).is_none() {
        warn!(function = name, "reply does not define the requested function");
    }

    write_artifact(&artifact.path, &merged)?;
    info!(artifact = %artifact.name, path = %artifact.path.display(), "artifact updated");

    let result = GenerateResult {
        artifact,
        function: name.to_string(),
        fingerprint: current,
        outcome: Outcome::Generated,
    };
    progress.done(&result);
    Ok(result)
}

/// Run [`ensure_generated`] for each template in order, stopping at the
/// first failure.
#[instrument(skip_all, fields(templates = templates.len()))]
pub async fn ensure_all<L: LanguageModel>(
    llm: &L,
    templates: &[TemplateFunction],
    config: &GenerateConfig,
    progress: &dyn ProgressReporter,
) -> Result<Vec<GenerateResult>> {
    let mut results = Vec::with_capacity(templates.len());
    for template in templates {
        results.push(ensure_generated(llm, template, config, progress).await?);
    }

    let generated = results
        .iter()
        .filter(|r| r.outcome == Outcome::Generated)
        .count();
    info!(
        generated,
        cache_hits = results.len() - generated,
        "generation complete"
    );

    Ok(results)
}

/// Check whether `template`'s artifact is up to date.
pub fn artifact_status(template: &TemplateFunction) -> Result<ArtifactStatus> {
    let artifact = ArtifactPaths::derive(&template.module_path, &template.module_name);
    let (module, metadata) = read_artifact(&artifact.path)?;
    let current = fingerprint(&template.stripped_source());

    let recorded = metadata.get(&template.name);
    let present = module.function(&template.name).is_some();

    Ok(match (recorded, present) {
        (Some(fp), true) if fp == current => ArtifactStatus::Fresh,
        (None, false) => ArtifactStatus::Missing,
        _ => ArtifactStatus::Stale,
    })
}

// ---------------------------------------------------------------------------
// Artifact I/O
// ---------------------------------------------------------------------------

/// Read and segment an artifact. A missing file reads as empty.
pub fn read_artifact(path: &Path) -> Result<(Module, GenerationMetadata)> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no artifact yet");
            String::new()
        }
        Err(e) => return Err(CodelessError::io(path, e)),
    };

    let module = codeless_segment::parse(&text)?;
    let metadata = GenerationMetadata::decode(&module)?;
    Ok((module, metadata))
}

/// Replace the artifact with `text` (write to temp, then rename).
fn write_artifact(path: &Path, text: &str) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CodelessError::io(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, text).map_err(|e| CodelessError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| CodelessError::io(path, e))?;

    debug!(path = %path.display(), size = text.len(), "wrote artifact");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
