//! Template functions: signatures (plus docstrings) whose bodies get generated.
//!
//! A template is read from its module file the way an introspecting runtime
//! would see it: the decorator lines directly above the `def`, then the
//! function block itself with trailing blank lines dropped.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use codeless_segment::{Function, Module};
use codeless_shared::{CodelessError, Result};

/// Matches the trigger annotation: a decorator whose dotted name ends in
/// `codeless`, with or without a call (`@codeless`, `@pkg.codeless()`).
static TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*@\s*(?:[A-Za-z_][A-Za-z0-9_]*\s*\.\s*)*codeless\s*(?:\(.*\))?\s*$")
        .expect("trigger regex")
});

/// Whether `line` is the trigger annotation.
pub fn is_trigger_line(line: &str) -> bool {
    TRIGGER_RE.is_match(line)
}

/// Remove the first trigger annotation line found in the leading decorator
/// block. Lines after the `def` are never touched.
pub fn strip_trigger(source: &str) -> Cow<'_, str> {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        if !line.starts_with('@') {
            break;
        }
        if is_trigger_line(line) {
            let mut stripped = String::with_capacity(source.len() - line.len());
            stripped.push_str(&source[..offset]);
            stripped.push_str(&source[offset + line.len()..]);
            return Cow::Owned(stripped);
        }
        offset += line.len();
    }
    Cow::Borrowed(source)
}

/// Logical module name fallback: the file stem.
pub fn module_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// TemplateFunction
// ---------------------------------------------------------------------------

/// A template function together with the module that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFunction {
    /// Dotted logical name of the owning module.
    pub module_name: String,
    /// File location of the owning module.
    pub module_path: PathBuf,
    /// Simple function name.
    pub name: String,
    /// Source as introspected: decorators, signature, docstring, placeholder body.
    pub source: String,
}

impl TemplateFunction {
    /// Load the template `name` from the module file at `module_path`.
    pub fn load(module_path: &Path, module_name: &str, name: &str) -> Result<Self> {
        let (text, module) = read_module(module_path)?;

        let function = module
            .function(name)
            .ok_or_else(|| CodelessError::TemplateNotFound {
                name: name.to_string(),
                path: module_path.to_path_buf(),
            })?;

        Ok(Self::from_block(module_path, module_name, &text, function))
    }

    /// Source handed to the generation backend: the trigger line removed.
    pub fn stripped_source(&self) -> Cow<'_, str> {
        strip_trigger(&self.source)
    }

    /// Whether the template carries the trigger annotation.
    pub fn is_triggered(&self) -> bool {
        decorator_lines(&self.source).any(is_trigger_line)
    }

    fn from_block(module_path: &Path, module_name: &str, text: &str, function: &Function) -> Self {
        let decorators = decorator_block(text, function.start_index);
        let body = function.source.trim_end();

        Self {
            module_name: module_name.to_string(),
            module_path: module_path.to_path_buf(),
            name: function.name.clone(),
            source: format!("{decorators}{body}\n"),
        }
    }
}

/// Every top-level function in the module that carries the trigger
/// annotation, in source order.
pub fn discover_templates(module_path: &Path, module_name: &str) -> Result<Vec<TemplateFunction>> {
    let (text, module) = read_module(module_path)?;

    let mut functions: Vec<&Function> = module.functions.values().collect();
    functions.sort_by_key(|f| f.start_index);

    let templates: Vec<TemplateFunction> = functions
        .into_iter()
        .map(|f| TemplateFunction::from_block(module_path, module_name, &text, f))
        .filter(TemplateFunction::is_triggered)
        .collect();

    debug!(
        path = %module_path.display(),
        found = templates.len(),
        "discovered templates"
    );

    Ok(templates)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_module(path: &Path) -> Result<(String, Module)> {
    let text = std::fs::read_to_string(path).map_err(|e| CodelessError::io(path, e))?;
    let module = codeless_segment::parse(&text)?;
    Ok((text, module))
}

/// The contiguous run of `@` lines that ends right before `start`.
fn decorator_block(text: &str, start: usize) -> &str {
    &text[decorator_start(text, start)..start]
}

/// Offset of the first decorator line directly above the block at `start`,
/// or `start` itself when there is none.
pub(crate) fn decorator_start(text: &str, start: usize) -> usize {
    let decorators_len: usize = text[..start]
        .split_inclusive('\n')
        .rev()
        .take_while(|line| line.starts_with('@'))
        .map(str::len)
        .sum();
    start - decorators_len
}

fn decorator_lines(source: &str) -> impl Iterator<Item = &str> {
    source.lines().take_while(|line| line.starts_with('@'))
}
