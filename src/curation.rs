use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{Identifier, PackageCuration, PackageCurationData, ProjectAnalyzerResult};

/// A source of package curations, injected into the engine as a capability.
///
/// How curations are stored and how patterns (e.g. wildcard versions) are
/// matched is a property of the provider; the engine only ever calls
/// [`curations_for`](Self::curations_for).
pub trait CurationProvider: Send + Sync {
    /// The curations applicable to `id`, in application order.
    fn curations_for(&self, id: &Identifier) -> Vec<PackageCuration>;
}

/// The provider used when no curation source is configured. Curation must
/// never be the difference between success and failure, so absence is a
/// first-class no-op rather than a null check in the pipeline.
pub struct NoOpCurationProvider;

impl CurationProvider for NoOpCurationProvider {
    fn curations_for(&self, _id: &Identifier) -> Vec<PackageCuration> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
struct CurationFile {
    #[serde(default)]
    curations: Vec<CurationEntry>,
}

#[derive(Debug, Deserialize)]
struct CurationEntry {
    /// Target identifier in `provider:namespace:name:version` form; an empty
    /// or `*` version matches any version.
    id: String,
    #[serde(default)]
    data: PackageCurationData,
}

/// Curations loaded from a TOML file of `[[curations]]` entries.
pub struct TomlCurationProvider {
    curations: Vec<PackageCuration>,
}

impl TomlCurationProvider {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CurationFile = toml::from_str(&content)?;

        let curations = file
            .curations
            .into_iter()
            .filter_map(|entry| {
                let id = Identifier::from(entry.id.clone());
                if id.name.is_empty() {
                    // Malformed target: skip this one curation, keep the rest.
                    warn!(id = %entry.id, "skipping curation without a package name");
                    return None;
                }
                Some(PackageCuration {
                    id,
                    data: entry.data,
                })
            })
            .collect();

        Ok(Self { curations })
    }
}

impl CurationProvider for TomlCurationProvider {
    fn curations_for(&self, id: &Identifier) -> Vec<PackageCuration> {
        self.curations
            .iter()
            .filter(|curation| curation.is_applicable(id))
            .cloned()
            .collect()
    }
}

/// Rebuild a result's package set by left-folding the applicable curations
/// over each package, preserving the set's identifier sort order.
///
/// Curations never change identifiers, so the result's referential integrity
/// is unaffected. A curation that fails to apply is skipped with a warning;
/// it never aborts the pipeline. Pure transform over freshly-allocated data,
/// safe to run in parallel across projects.
pub fn apply_curations(
    provider: &dyn CurationProvider,
    result: ProjectAnalyzerResult,
) -> ProjectAnalyzerResult {
    let packages = result
        .packages
        .into_iter()
        .map(|curated| {
            let curations = provider.curations_for(curated.id());
            curations.iter().fold(curated, |current, curation| {
                debug!(package = %current.id(), "applying curation");
                match curation.apply(&current) {
                    Ok(next) => next,
                    Err(err) => {
                        warn!("skipping curation: {err}");
                        current
                    }
                }
            })
        })
        .collect();

    ProjectAnalyzerResult { packages, ..result }
}
