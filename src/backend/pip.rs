use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use super::{error_result, PackageManager};
use crate::config::AnalyzerConfig;
use crate::model::{Identifier, Package, PackageReference, Project, ProjectAnalyzerResult, Scope};

const PROVIDER: &str = "PyPI";

/// Backend for Python projects using pinned `requirements.txt` files.
///
/// Requirements files carry no transitive information, so the result is a
/// flat list of root references in a single `install` scope. Lines that are
/// not exact pins (`name==version`) cannot be resolved deterministically and
/// are reported as resolution errors.
pub struct Pip {
    config: AnalyzerConfig,
}

impl Pip {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }
}

impl PackageManager for Pip {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn definition_files(&self) -> &'static [&'static str] {
        &["requirements.txt"]
    }

    fn resolve_dependencies(
        &self,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<BTreeMap<PathBuf, ProjectAnalyzerResult>> {
        let mut results = BTreeMap::new();
        for file in files {
            debug!(file = %file.display(), "resolving PyPI project");
            let result = match resolve_file(&self.config, root, file) {
                Ok(result) => result,
                Err(err) => error_result(
                    self.config.clone(),
                    PROVIDER,
                    file,
                    format!("failed to resolve '{}': {err:#}", file.display()),
                ),
            };
            results.insert(file.clone(), result);
        }
        Ok(results)
    }
}

fn resolve_file(
    config: &AnalyzerConfig,
    root: &Path,
    requirements_path: &Path,
) -> Result<ProjectAnalyzerResult> {
    let working_dir = requirements_path.parent().unwrap_or(root);
    let content = std::fs::read_to_string(requirements_path)?;

    let name = working_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| working_dir.display().to_string());
    let mut project = Project::new(
        Identifier::new(PROVIDER, "", name, ""),
        requirements_path.display().to_string(),
    );
    project.vcs_processed = crate::vcs::clone_info(working_dir);

    let pinned = Regex::new(r"^([A-Za-z0-9_\-\.]+)\s*==\s*([^\s;]+)")?;
    let mut references = Vec::new();
    let mut packages = BTreeSet::new();
    let mut errors = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        // Comments and pip flags (-r, -e, --hash, ...) carry no package.
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }

        if let Some(captures) = pinned.captures(line) {
            let id = Identifier::new(PROVIDER, "", &captures[1], &captures[2]);
            packages.insert(Package::new(id.clone()).curated());
            references.push(PackageReference::new(id));
        } else if config.allow_dynamic_versions {
            let name = line
                .split(|c: char| !(c.is_ascii_alphanumeric() || "._-".contains(c)))
                .next()
                .unwrap_or(line);
            let id = Identifier::new(PROVIDER, "", name, "*");
            packages.insert(Package::new(id.clone()).curated());
            references.push(PackageReference::new(id));
        } else {
            errors.push(format!(
                "cannot resolve requirement '{line}': not an exact pin and dynamic versions are not allowed"
            ));
        }
    }

    if !references.is_empty() {
        project.scopes.push(Scope::new("install", references));
    }

    Ok(ProjectAnalyzerResult::new(
        config.clone(),
        project,
        packages,
        errors,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolve(content: &str, config: &AnalyzerConfig) -> ProjectAnalyzerResult {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("requirements.txt");
        fs::write(&file, content).unwrap();
        let results = Pip::new(config.clone())
            .resolve_dependencies(dir.path(), &[file])
            .unwrap();
        results.into_iter().next().unwrap().1
    }

    #[test]
    fn test_pinned_requirements_resolve_flat() {
        let result = resolve(
            "# comment\nrequests==2.28.1\nnumpy==1.24.0 ; python_version >= '3.8'\n-r other.txt\n",
            &AnalyzerConfig::default(),
        );

        assert!(!result.has_errors());
        let scope = &result.project.scopes[0];
        assert_eq!(scope.name, "install");
        assert_eq!(scope.dependencies.len(), 2);
        assert_eq!(
            scope.dependencies[0].id,
            Identifier::new("PyPI", "", "requests", "2.28.1")
        );
        assert_eq!(result.packages.len(), 2);
    }

    #[test]
    fn test_range_requirement_is_an_error_by_default() {
        let result = resolve("flask>=2.0.0\n", &AnalyzerConfig::default());
        assert!(result.has_errors());
        assert!(result.errors[0].contains("flask>=2.0.0"));
        assert!(result.project.scopes.is_empty());
    }

    #[test]
    fn test_range_requirement_allowed_with_dynamic_versions() {
        let config = AnalyzerConfig {
            allow_dynamic_versions: true,
            ..Default::default()
        };
        let result = resolve("flask>=2.0.0\n", &config);
        assert!(!result.has_errors());
        assert_eq!(
            result.project.scopes[0].dependencies[0].id,
            Identifier::new("PyPI", "", "flask", "*")
        );
    }
}
