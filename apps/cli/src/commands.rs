//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use codeless_core::{
    ArtifactPaths, ArtifactStatus, FailureReport, GenerateConfig, GenerateResult, ModuleLoader,
    Outcome, ProgressReporter, ResolutionTable, SourceExcerpt, TemplateFunction, artifact_status,
    discover_templates, ensure_all, fingerprint, module_name_from_path,
};
use codeless_llm::{OpenAiLanguageModel, OpenAiSettings};
use codeless_shared::{AppConfig, init_config, load_config, resolve_api_key};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// codeless — generate Python function bodies from their templates.
#[derive(Parser)]
#[command(
    name = "codeless",
    version,
    about = "Generate Python function implementations from signatures and docstrings.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate (or reuse) implementations for the templates in a module.
    Generate {
        /// Template module file.
        file: PathBuf,

        /// Dotted logical module name (defaults to the file stem).
        #[arg(short, long)]
        module: Option<String>,

        /// Only these functions (repeatable). Defaults to every triggered template.
        #[arg(short, long = "function")]
        functions: Vec<String>,

        /// Python version the generated code must support (overrides config).
        #[arg(long)]
        python_version: Option<String>,

        /// Print the generated functions after the run.
        #[arg(long)]
        show: bool,
    },

    /// Show whether each template's artifact is fresh, stale or missing.
    Status {
        /// Template module file.
        file: PathBuf,

        /// Dotted logical module name (defaults to the file stem).
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Segment a module and print its docstring and functions.
    Parse {
        /// Python source file.
        file: PathBuf,

        /// Emit the segmented module as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the triggered templates in a module with their fingerprints.
    Templates {
        /// Template module file.
        file: PathBuf,
    },

    /// Print the artifact location and logical name for a module.
    Paths {
        /// Template module file.
        file: PathBuf,

        /// Dotted logical module name (defaults to the file stem).
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Ask the model to explain a Python traceback.
    Explain {
        /// File containing the traceback text.
        #[arg(long)]
        traceback: PathBuf,

        /// Source files involved in the failure (repeatable).
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "codeless=info",
        1 => "codeless=debug",
        _ => "codeless=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            file,
            module,
            functions,
            python_version,
            show,
        } => cmd_generate(&file, module.as_deref(), &functions, python_version.as_deref(), show).await,
        Command::Status { file, module } => cmd_status(&file, module.as_deref()),
        Command::Parse { file, json } => cmd_parse(&file, json),
        Command::Templates { file } => cmd_templates(&file),
        Command::Paths { file, module } => cmd_paths(&file, module.as_deref()),
        Command::Explain { traceback, sources } => cmd_explain(&traceback, &sources).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

async fn cmd_generate(
    file: &Path,
    module: Option<&str>,
    functions: &[String],
    python_version: Option<&str>,
    show: bool,
) -> Result<()> {
    // Fail on a missing key before touching anything
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;

    let module_name = resolve_module_name(file, module)?;
    let templates = select_templates(file, &module_name, functions)?;
    if templates.is_empty() {
        println!("No templates found in {}", file.display());
        return Ok(());
    }

    let llm = OpenAiLanguageModel::new(OpenAiSettings::from_config(&config, api_key))?;
    let generate_config = GenerateConfig {
        python_version: python_version
            .map(String::from)
            .unwrap_or_else(|| config.generation.resolve_python_version()),
    };

    info!(
        file = %file.display(),
        module = %module_name,
        templates = templates.len(),
        model = llm.model_name(),
        "generating"
    );

    let reporter = CliProgress::new();
    let outcome = ensure_all(&llm, &templates, &generate_config, &reporter).await;
    reporter.finish();
    let results = outcome?;

    let artifact = ArtifactPaths::derive(file, &module_name);
    let generated = results
        .iter()
        .filter(|r| r.outcome == Outcome::Generated)
        .count();

    println!();
    for result in &results {
        let label = match result.outcome {
            Outcome::Generated => "generated",
            Outcome::CacheHit => "cache hit",
        };
        println!("  {label:<10} {}", result.function);
    }
    println!();
    println!("  Artifact:   {}", artifact.name);
    println!("  Path:       {}", artifact.path.display());
    println!("  Generated:  {generated}");
    println!("  Cache hits: {}", results.len() - generated);
    println!();

    if show {
        show_generated(&artifact, &module_name, &results)?;
    }

    Ok(())
}

/// Load the artifact and print each generated function.
fn show_generated(artifact: &ArtifactPaths, module_name: &str, results: &[GenerateResult]) -> Result<()> {
    let mut loader = ModuleLoader::new();
    let unit = loader.load(
        &artifact.path,
        &artifact.name,
        &ResolutionTable::for_template(module_name),
    )?;

    for result in results {
        match unit.function(&result.function) {
            Some(function) => println!("{}", function.source.trim_end()),
            None => println!("# {} was not found in the artifact", result.function),
        }
        println!();
    }
    Ok(())
}

fn cmd_status(file: &Path, module: Option<&str>) -> Result<()> {
    let module_name = resolve_module_name(file, module)?;
    let templates = discover_templates(file, &module_name)?;

    if templates.is_empty() {
        println!("No templates found in {}", file.display());
        return Ok(());
    }

    for template in &templates {
        let status = match artifact_status(template)? {
            ArtifactStatus::Fresh => "fresh",
            ArtifactStatus::Stale => "stale",
            ArtifactStatus::Missing => "missing",
        };
        println!("{status:<8} {}", template.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

fn cmd_parse(file: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let module = codeless_segment::parse(&text)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&module)?);
        return Ok(());
    }

    match &module.docstring {
        Some(doc) => println!("docstring  {}..{}", doc.start_index, doc.end_index),
        None => println!("docstring  -"),
    }

    let mut functions: Vec<_> = module.functions.values().collect();
    functions.sort_by_key(|f| f.start_index);
    for function in functions {
        println!(
            "def        {}..{}  {}",
            function.start_index, function.end_index, function.name
        );
    }
    Ok(())
}

fn cmd_templates(file: &Path) -> Result<()> {
    let module_name = resolve_module_name(file, None)?;
    let templates = discover_templates(file, &module_name)?;

    for template in &templates {
        println!("{}  {}", fingerprint(&template.stripped_source()), template.name);
    }
    Ok(())
}

fn cmd_paths(file: &Path, module: Option<&str>) -> Result<()> {
    let module_name = resolve_module_name(file, module)?;
    let artifact = ArtifactPaths::derive(file, &module_name);

    println!("name  {}", artifact.name);
    println!("path  {}", artifact.path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Diagnosis
// ---------------------------------------------------------------------------

async fn cmd_explain(traceback: &Path, sources: &[PathBuf]) -> Result<()> {
    let text = std::fs::read_to_string(traceback)
        .map_err(|e| eyre!("cannot read traceback '{}': {e}", traceback.display()))?;

    let mut report = FailureReport::new(text);
    for source in sources {
        report = report.with_source(SourceExcerpt::from_file(source)?);
    }

    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;
    let llm = OpenAiLanguageModel::new(OpenAiSettings::from_config(&config, api_key))?;

    let reporter = CliProgress::new();
    reporter.phase("Generating error analysis");
    let analysis = codeless_core::diagnose(&llm, &report).await;
    reporter.finish();

    println!("{}", analysis?.trim_end());
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_module_name(file: &Path, module: Option<&str>) -> Result<String> {
    module
        .map(String::from)
        .or_else(|| module_name_from_path(file))
        .ok_or_else(|| eyre!("cannot derive a module name from '{}'; pass --module", file.display()))
}

fn select_templates(file: &Path, module_name: &str, functions: &[String]) -> Result<Vec<TemplateFunction>> {
    if functions.is_empty() {
        return Ok(discover_templates(file, module_name)?);
    }

    functions
        .iter()
        .map(|name| TemplateFunction::load(file, module_name, name).map_err(Into::into))
        .collect()
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, result: &GenerateResult) {
        let label = match result.outcome {
            Outcome::Generated => "generated",
            Outcome::CacheHit => "up to date",
        };
        self.spinner.set_message(format!("{}: {label}", result.function));
    }
}
