//! codeless CLI: generate function bodies from Python templates.
//!
//! Reads template functions marked with the trigger decorator, asks a
//! language model for their implementations, and keeps the generated
//! artifact module up to date incrementally.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
