use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "depscanr",
    about = "Scan a project tree and resolve its package-manager dependencies into one verified graph",
    version
)]
pub struct Cli {
    /// Project path to scan; may be a single definition file when exactly one
    /// package manager is selected
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Restrict analysis to these package managers (repeatable)
    #[arg(short = 'm', long = "package-manager", value_name = "NAME")]
    pub package_managers: Vec<String>,

    /// Analyzer config file [default: ./.depscanr/config.toml, fallback ~/.config/depscanr/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// TOML file with package curation data
    #[arg(long, value_name = "FILE")]
    pub curations_file: Option<PathBuf>,

    /// Per-package-manager resolution timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Allow declared version ranges where no lock file pins exact versions
    #[arg(long)]
    pub allow_dynamic_versions: bool,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Write the full analyzer result as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show per-package detail, not just projects and errors
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
