use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Analyzer configuration, deserialized from `.depscanr/config.toml`.
///
/// A snapshot of this travels inside every
/// [`ProjectAnalyzerResult`](crate::model::ProjectAnalyzerResult) so a
/// serialized result records what it was produced under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Restrict analysis to these package managers by name. `None` activates
    /// the full registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_managers: Option<Vec<String>>,
    /// Allow backends to fall back to declared version ranges when no lock
    /// file pins exact versions. Unstable results, off by default.
    pub allow_dynamic_versions: bool,
    /// Upper bound for one package manager's dependency resolution. Hitting
    /// it records an error for that manager's files and the run continues.
    pub resolution_timeout_secs: u64,
    /// TOML file with package curation data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curations_file: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            package_managers: None,
            allow_dynamic_versions: false,
            resolution_timeout_secs: 300,
            curations_file: None,
        }
    }
}

/// Load the analyzer configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.depscanr/config.toml`
/// 3. `~/.config/depscanr/config.toml`
/// 4. Built-in [`AnalyzerConfig::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<AnalyzerConfig> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&content)?);
    }

    let project_config = project_path.join(".depscanr").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return Ok(toml::from_str(&content)?);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("depscanr").join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return Ok(toml::from_str(&content)?);
        }
    }

    Ok(AnalyzerConfig::default())
}
