use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use super::{error_result, PackageManager};
use crate::config::AnalyzerConfig;
use crate::model::{
    Identifier, Package, PackageReference, Project, ProjectAnalyzerResult, Scope, VcsInfo,
};

const PROVIDER: &str = "Cargo";

#[derive(Debug, Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<LockPackage>,
}

#[derive(Debug, Deserialize)]
struct LockPackage {
    name: String,
    version: String,
    /// Packages without a `source` field are local workspace members.
    source: Option<String>,
    /// Entries are `"name"` or `"name version"` (plus a source in parens for
    /// ambiguous cases).
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Backend for Rust projects: reads `Cargo.toml` for project identity and the
/// sibling `Cargo.lock` for the pinned dependency graph.
pub struct Cargo {
    config: AnalyzerConfig,
}

impl Cargo {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }
}

impl PackageManager for Cargo {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn definition_files(&self) -> &'static [&'static str] {
        &["Cargo.toml"]
    }

    fn resolve_dependencies(
        &self,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<BTreeMap<PathBuf, ProjectAnalyzerResult>> {
        let mut results = BTreeMap::new();
        for file in files {
            debug!(file = %file.display(), "resolving Cargo project");
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
    manifest_path: &Path,
) -> Result<ProjectAnalyzerResult> {
    let working_dir = manifest_path.parent().unwrap_or(root);
    let manifest: toml::Value = toml::from_str(&std::fs::read_to_string(manifest_path)?)?;

    let package = manifest.get("package");
    let name = package
        .and_then(|p| p.get("name"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| dir_name(working_dir));
    let version = package
        .and_then(|p| p.get("version"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let mut project = Project::new(
        Identifier::new(PROVIDER, "", name, version),
        manifest_path.display().to_string(),
    );
    if let Some(license) = package.and_then(|p| p.get("license")).and_then(|v| v.as_str()) {
        project.declared_licenses.push(license.to_string());
    }
    if let Some(homepage) = package.and_then(|p| p.get("homepage")).and_then(|v| v.as_str()) {
        project.homepage_url = homepage.to_string();
    }
    if let Some(repository) = package
        .and_then(|p| p.get("repository"))
        .and_then(|v| v.as_str())
    {
        project.vcs = VcsInfo::new("Git", repository, "");
    }
    project.vcs_processed = crate::vcs::clone_info(working_dir);

    let lock_path = working_dir.join("Cargo.lock");
    let mut errors = Vec::new();
    let mut package_ids = BTreeSet::new();
    let mut local_members: BTreeSet<Identifier> = BTreeSet::new();

    if lock_path.exists() {
        let lock: CargoLock = toml::from_str(&std::fs::read_to_string(&lock_path)?)?;
        let index = index_lock(&lock);

        // Lock entries without a source are path dependencies from this
        // checkout, not registry packages.
        local_members.extend(lock.package.iter().filter(|p| p.source.is_none()).map(|p| {
            Identifier::new(PROVIDER, "", p.name.clone(), p.version.clone())
        }));

        for scope_name in ["dependencies", "dev-dependencies"] {
            let Some(declared) = manifest.get(scope_name).and_then(|v| v.as_table()) else {
                continue;
            };
            let references = declared
                .keys()
                .map(|dep_name| {
                    let mut ancestors = Vec::new();
                    build_reference(&index, dep_name, None, &mut ancestors, &mut package_ids)
                })
                .collect();
            project.scopes.push(Scope::new(scope_name, references));
        }
    } else if config.allow_dynamic_versions {
        // No lock file: fall back to the declared version requirements.
        for scope_name in ["dependencies", "dev-dependencies"] {
            let Some(declared) = manifest.get(scope_name).and_then(|v| v.as_table()) else {
                continue;
            };
            let references = declared
                .iter()
                .map(|(dep_name, value)| {
                    let requirement = declared_requirement(value);
                    let id = Identifier::new(PROVIDER, "", dep_name.clone(), requirement);
                    package_ids.insert(id.clone());
                    PackageReference::new(id)
                })
                .collect();
            project.scopes.push(Scope::new(scope_name, references));
        }
    } else {
        errors.push(format!(
            "no Cargo.lock found next to '{}' and dynamic versions are not allowed",
            manifest_path.display()
        ));
    }

    package_ids.remove(&project.id);
    let packages = package_ids
        .into_iter()
        .map(|id| {
            let mut package = Package::new(id);
            if local_members.contains(&package.id) {
                package.vcs = project.vcs_processed.clone();
            }
            package.curated()
        })
        .collect();

    Ok(ProjectAnalyzerResult::new(
        config.clone(),
        project,
        packages,
        errors,
    )?)
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn declared_requirement(value: &toml::Value) -> String {
    match value {
        toml::Value::String(requirement) => requirement.clone(),
        toml::Value::Table(table) => table
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("*")
            .to_string(),
        _ => "*".to_string(),
    }
}

fn index_lock(lock: &CargoLock) -> BTreeMap<&str, Vec<&LockPackage>> {
    let mut index: BTreeMap<&str, Vec<&LockPackage>> = BTreeMap::new();
    for package in &lock.package {
        index.entry(package.name.as_str()).or_default().push(package);
    }
    index
}

fn lookup<'a>(
    index: &BTreeMap<&str, Vec<&'a LockPackage>>,
    name: &str,
    version: Option<&str>,
) -> Option<&'a LockPackage> {
    let candidates = index.get(name)?;
    match version {
        Some(version) => candidates.iter().find(|p| p.version == version).copied(),
        None => candidates.first().copied(),
    }
}

/// Expand a lock entry into a reference tree node. A name missing from the
/// lock file becomes a node-local error; an identifier already on the path
/// from the root means the lock file is malformed and the branch is cut off
/// with an error instead of recursing forever.
fn build_reference(
    index: &BTreeMap<&str, Vec<&LockPackage>>,
    name: &str,
    version: Option<&str>,
    ancestors: &mut Vec<Identifier>,
    package_ids: &mut BTreeSet<Identifier>,
) -> PackageReference {
    let Some(locked) = lookup(index, name, version) else {
        let mut reference =
            PackageReference::new(Identifier::new(PROVIDER, "", name, version.unwrap_or("")));
        reference
            .errors
            .push(format!("cannot resolve '{name}': not found in Cargo.lock"));
        return reference;
    };

    let id = Identifier::new(PROVIDER, "", locked.name.clone(), locked.version.clone());
    let mut reference = PackageReference::new(id.clone());

    if ancestors.contains(&id) {
        reference
            .errors
            .push(format!("dependency cycle detected at '{id}'"));
        return reference;
    }

    package_ids.insert(id.clone());
    ancestors.push(id);
    for spec in &locked.dependencies {
        let mut parts = spec.split_whitespace();
        let Some(dep_name) = parts.next() else {
            continue;
        };
        let dep_version = parts.next().filter(|p| !p.starts_with('('));
        reference
            .dependencies
            .push(build_reference(index, dep_name, dep_version, ancestors, package_ids));
    }
    ancestors.pop();

    reference
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[package]
name = "my-app"
version = "0.1.0"
license = "MIT"
repository = "https://example.com/my-app.git"

[dependencies]
serde = "1"

[dev-dependencies]
tempdir = "0.3"
"#;

    const LOCK: &str = r#"
version = 3

[[package]]
name = "my-app"
version = "0.1.0"
dependencies = ["serde"]

[[package]]
name = "serde"
version = "1.0.150"
source = "registry+https://github.com/rust-lang/crates.io-index"
dependencies = ["serde_derive"]

[[package]]
name = "serde_derive"
version = "1.0.150"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "tempdir"
version = "0.3.7"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

    fn write_project(manifest: &str, lock: Option<&str>) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), manifest).unwrap();
        if let Some(lock) = lock {
            fs::write(dir.path().join("Cargo.lock"), lock).unwrap();
        }
        dir
    }

    fn resolve(dir: &TempDir, config: &AnalyzerConfig) -> ProjectAnalyzerResult {
        let manifest = dir.path().join("Cargo.toml");
        let results = Cargo::new(config.clone())
            .resolve_dependencies(dir.path(), &[manifest.clone()])
            .unwrap();
        results.into_iter().next().unwrap().1
    }

    #[test]
    fn test_resolves_pinned_graph_from_lock() {
        let dir = write_project(MANIFEST, Some(LOCK));
        let result = resolve(&dir, &AnalyzerConfig::default());

        assert_eq!(result.project.id, Identifier::new("Cargo", "", "my-app", "0.1.0"));
        assert_eq!(result.project.declared_licenses, vec!["MIT".to_string()]);
        assert!(!result.has_errors());

        let scopes: Vec<&str> = result.project.scopes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(scopes, vec!["dependencies", "dev-dependencies"]);

        // serde pulls in serde_derive transitively.
        let serde_ref = &result.project.scopes[0].dependencies[0];
        assert_eq!(serde_ref.id.version, "1.0.150");
        assert_eq!(serde_ref.dependencies[0].id.name, "serde_derive");

        let package_names: Vec<&str> = result
            .packages
            .iter()
            .map(|p| p.id().name.as_str())
            .collect();
        assert_eq!(package_names, vec!["serde", "serde_derive", "tempdir"]);
    }

    #[test]
    fn test_missing_lock_entry_is_a_node_error() {
        let lock = r#"
[[package]]
name = "my-app"
version = "0.1.0"
"#;
        let dir = write_project(MANIFEST, Some(lock));
        let result = resolve(&dir, &AnalyzerConfig::default());

        assert!(result.has_errors());
        let serde_ref = &result.project.scopes[0].dependencies[0];
        assert!(serde_ref.errors[0].contains("not found in Cargo.lock"));
        // The unresolved reference is exempt from the package-set invariant.
        assert!(!result.packages.iter().any(|p| p.id().name == "serde"));
    }

    #[test]
    fn test_missing_lock_file_is_a_top_level_error() {
        let dir = write_project(MANIFEST, None);
        let result = resolve(&dir, &AnalyzerConfig::default());

        assert!(result.has_errors());
        assert!(result.errors[0].contains("no Cargo.lock"));
        assert!(result.project.scopes.is_empty());
    }

    #[test]
    fn test_dynamic_versions_fall_back_to_declared_requirements() {
        let dir = write_project(MANIFEST, None);
        let config = AnalyzerConfig {
            allow_dynamic_versions: true,
            ..Default::default()
        };
        let result = resolve(&dir, &config);

        assert!(!result.has_errors());
        assert_eq!(
            result.project.scopes[0].dependencies[0].id,
            Identifier::new("Cargo", "", "serde", "1")
        );
    }

    #[test]
    fn test_cycle_in_lock_is_cut_off_with_an_error() {
        let manifest = r#"
[package]
name = "my-app"
version = "0.1.0"

[dependencies]
a = "1"
"#;
        let lock = r#"
[[package]]
name = "a"
version = "1.0.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
dependencies = ["b"]

[[package]]
name = "b"
version = "1.0.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
dependencies = ["a"]
"#;
        let dir = write_project(manifest, Some(lock));
        let result = resolve(&dir, &AnalyzerConfig::default());

        let a = &result.project.scopes[0].dependencies[0];
        let b = &a.dependencies[0];
        let a_again = &b.dependencies[0];
        assert!(a_again.errors[0].contains("cycle"));
        assert!(a_again.dependencies.is_empty());
    }

    #[test]
    fn test_local_workspace_members_carry_the_checkout_vcs() {
        let manifest = r#"
[package]
name = "my-app"
version = "0.1.0"

[dependencies]
member = { path = "../member" }
serde = "1"
"#;
        let lock = r#"
[[package]]
name = "my-app"
version = "0.1.0"
dependencies = ["member", "serde"]

[[package]]
name = "member"
version = "0.1.0"
dependencies = ["serde"]

[[package]]
name = "serde"
version = "1.0.150"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;
        let dir = write_project(manifest, Some(lock));
        let git = dir.path().join(".git");
        fs::create_dir_all(git.join("refs").join("heads")).unwrap();
        fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(git.join("refs").join("heads").join("main"), "abc123\n").unwrap();
        fs::write(
            git.join("config"),
            "[remote \"origin\"]\n\turl = https://example.com/workspace.git\n",
        )
        .unwrap();

        let result = resolve(&dir, &AnalyzerConfig::default());

        let member = result.packages.iter().find(|p| p.id().name == "member").unwrap();
        assert_eq!(member.package.vcs.url, "https://example.com/workspace.git");

        // Registry packages keep the unknown default.
        let serde = result.packages.iter().find(|p| p.id().name == "serde").unwrap();
        assert_eq!(serde.package.vcs, crate::model::VcsInfo::default());
    }

    #[test]
    fn test_unparseable_manifest_becomes_backend_level_error() {
        let dir = write_project("not [ valid toml", None);
        let result = resolve(&dir, &AnalyzerConfig::default());

        assert!(result.has_errors());
        assert!(result.errors[0].contains("failed to resolve"));
        assert!(result.packages.is_empty());
    }
}
