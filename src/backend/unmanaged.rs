use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::PackageManager;
use crate::config::AnalyzerConfig;
use crate::model::{Project, ProjectAnalyzerResult};

/// Sentinel backend for directories no real package manager claims.
///
/// Produces a minimal synthetic project with no packages and no errors, so
/// every analyzed root is guaranteed to yield at least one project. Not part
/// of the registry; the engine adds it as a fallback.
pub struct Unmanaged {
    config: AnalyzerConfig,
}

impl Unmanaged {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }
}

impl PackageManager for Unmanaged {
    fn name(&self) -> &'static str {
        "Unmanaged"
    }

    fn definition_files(&self) -> &'static [&'static str] {
        &[]
    }

    fn resolve_dependencies(
        &self,
        _root: &Path,
        files: &[PathBuf],
    ) -> Result<BTreeMap<PathBuf, ProjectAnalyzerResult>> {
        let mut results = BTreeMap::new();
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let mut project = Project::unmanaged(name, file.display().to_string());
            project.vcs_processed = crate::vcs::clone_info(file);

            let result = ProjectAnalyzerResult::new(
                self.config.clone(),
                project,
                BTreeSet::new(),
                Vec::new(),
            )?;
            results.insert(file.clone(), result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_synthetic_project_for_unclaimed_root() {
        let dir = TempDir::new().unwrap();
        let results = Unmanaged::new(AnalyzerConfig::default())
            .resolve_dependencies(dir.path(), &[dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[&dir.path().to_path_buf()];
        assert_eq!(result.project.id.provider, "Unmanaged");
        assert!(result.packages.is_empty());
        assert!(!result.has_errors());
    }
}
