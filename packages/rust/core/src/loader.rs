//! Loading artifacts as named units.
//!
//! An artifact re-exports its template module through the reserved alias.
//! Instead of registering that alias anywhere global, each load receives a
//! [`ResolutionTable`] saying what the alias (and any other star import)
//! refers to for that load only.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, instrument};

use codeless_segment::{Function, Module};
use codeless_shared::{CodelessError, Result};

use crate::naming::RESERVED_ALIAS;

/// Top-level `from X import *` line.
static STAR_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^from\s+([A-Za-z_][A-Za-z0-9_.]*)\s+import\s+\*\s*$").expect("star import regex")
});

// ---------------------------------------------------------------------------
// ResolutionTable
// ---------------------------------------------------------------------------

/// Alias → logical module name bindings for a single load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTable {
    bindings: BTreeMap<String, String>,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that binds the reserved alias to `template_module`.
    pub fn for_template(template_module: &str) -> Self {
        let mut table = Self::new();
        table.bind(RESERVED_ALIAS, template_module);
        table
    }

    pub fn bind(&mut self, alias: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.bindings.insert(alias.into(), target.into());
        self
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.bindings.get(alias).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// LoadedModule
// ---------------------------------------------------------------------------

/// A star import after alias resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarImport {
    /// Module name as written in the source.
    pub written: String,
    /// Logical module it refers to for this load.
    pub target: String,
}

/// A segmented artifact with its imports resolved.
#[derive(Debug)]
pub struct LoadedModule {
    pub name: String,
    pub path: PathBuf,
    pub module: Module,
    imports: Vec<StarImport>,
}

impl LoadedModule {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.module.function(name)
    }

    pub fn star_imports(&self) -> &[StarImport] {
        &self.imports
    }

    /// Which logical module a `from X import *` line binds to in this unit.
    pub fn resolve_import(&self, line: &str) -> Option<&str> {
        let written = STAR_IMPORT_RE.captures(line.trim())?.get(1)?.as_str();
        self.imports
            .iter()
            .find(|import| import.written == written)
            .map(|import| import.target.as_str())
    }
}

// ---------------------------------------------------------------------------
// ModuleLoader
// ---------------------------------------------------------------------------

/// Loads artifacts and caches them by logical name.
///
/// The cache belongs to the loader instance; two loaders never share units.
#[derive(Debug, Default)]
pub struct ModuleLoader {
    cache: HashMap<String, Arc<LoadedModule>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the unit at `path` under `name`.
    ///
    /// A name that was loaded before returns the cached unit, whatever `path`
    /// and `table` say this time.
    #[instrument(skip_all, fields(name = %name, path = %path.display()))]
    pub fn load(&mut self, path: &Path, name: &str, table: &ResolutionTable) -> Result<Arc<LoadedModule>> {
        if let Some(cached) = self.cache.get(name) {
            debug!("module already loaded");
            return Ok(Arc::clone(cached));
        }

        let text = std::fs::read_to_string(path).map_err(|e| CodelessError::io(path, e))?;
        let module = codeless_segment::parse(&text)?;
        let imports = resolve_star_imports(&module, table)?;

        let loaded = Arc::new(LoadedModule {
            name: name.to_string(),
            path: path.to_path_buf(),
            module,
            imports,
        });
        self.cache.insert(name.to_string(), Arc::clone(&loaded));

        debug!(
            functions = loaded.module.functions.len(),
            imports = loaded.imports.len(),
            "module loaded"
        );
        Ok(loaded)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Forget a cached unit so the next load reads the file again.
    pub fn evict(&mut self, name: &str) -> Option<Arc<LoadedModule>> {
        self.cache.remove(name)
    }
}

/// Collect star imports that sit outside every docstring and function.
fn resolve_star_imports(module: &Module, table: &ResolutionTable) -> Result<Vec<StarImport>> {
    let spans = module.spans();
    let mut imports = Vec::new();
    let mut offset = 0;

    for line in module.source.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        if spans.iter().any(|span| span.contains(&start)) {
            continue;
        }
        let Some(written) = STAR_IMPORT_RE
            .captures(line.trim_end())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
        else {
            continue;
        };

        let target = match table.resolve(written) {
            Some(target) => target.to_string(),
            None if written == RESERVED_ALIAS => {
                return Err(CodelessError::config(format!(
                    "{RESERVED_ALIAS} is imported but not bound to a template module"
                )));
            }
            None => written.to_string(),
        };

        imports.push(StarImport {
            written: written.to_string(),
            target,
        });
    }

    Ok(imports)
}
