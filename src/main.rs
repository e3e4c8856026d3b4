//! `depscanr` — scan a project tree, resolve its dependencies, and merge them
//! into one verified result.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load the analyzer config ([`config::load_config`]).
//! 3. Select active package managers from the registry ([`backend`]).
//! 4. Discover definition files and resolve each manager's dependencies,
//!    applying curations along the way ([`analyzer::analyze`]).
//! 5. Freeze and verify the aggregate ([`model::AnalyzerResultBuilder::build`]).
//! 6. Render the requested report ([`report`]) and optionally write JSON.
//! 7. Exit `0` (clean) or `1` (the result carries resolution errors).

mod analyzer;
mod backend;
mod cli;
mod config;
mod curation;
mod error;
mod model;
mod report;
mod vcs;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use backend::PackageManager;
use cli::{Cli, ReportFormat};
use curation::{CurationProvider, NoOpCurationProvider, TomlCurationProvider};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let path = cli.path.canonicalize().unwrap_or_else(|_| cli.path.clone());

    let mut config = config::load_config(&path, cli.config.as_deref())?;
    if !cli.package_managers.is_empty() {
        config.package_managers = Some(cli.package_managers.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.resolution_timeout_secs = timeout;
    }
    if cli.allow_dynamic_versions {
        config.allow_dynamic_versions = true;
    }
    if let Some(curations_file) = &cli.curations_file {
        config.curations_file = Some(curations_file.clone());
    }

    let managers = select_managers(&config)?;
    let provider: Arc<dyn CurationProvider> = match &config.curations_file {
        Some(file) => Arc::new(
            TomlCurationProvider::from_file(file)
                .with_context(|| format!("failed to load curations from '{}'", file.display()))?,
        ),
        None => Arc::new(NoOpCurationProvider),
    };

    let builder = analyzer::analyze(&config, &path, managers, provider).await?;
    let result = builder.build()?;

    match cli.report {
        ReportFormat::Terminal => report::render(&result, &path, cli.verbose, cli.quiet)?,
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if let Some(output) = &cli.output {
        std::fs::write(output, serde_json::to_string_pretty(&result)?)?;
        if !cli.quiet {
            eprintln!("Wrote analyzer result to '{}'.", output.display());
        }
    }

    // Exit code: 1 if anything failed to resolve
    if result.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Instantiate the active package managers, honoring the configured filter.
/// Unknown names are a configuration error listing the valid registry.
fn select_managers(config: &config::AnalyzerConfig) -> Result<Vec<Arc<dyn PackageManager>>> {
    let registry = backend::all(config);

    let Some(selected) = &config.package_managers else {
        return Ok(registry);
    };

    let mut managers = Vec::new();
    for name in selected {
        match registry
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
        {
            Some(manager) => managers.push(Arc::clone(manager)),
            None => {
                let known: Vec<&str> = registry.iter().map(|m| m.name()).collect();
                bail!(
                    "unknown package manager '{name}'; known managers: {}",
                    known.join(", ")
                );
            }
        }
    }
    Ok(managers)
}
