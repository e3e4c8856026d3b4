use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use super::{error_result, PackageManager};
use crate::config::AnalyzerConfig;
use crate::model::{
    Identifier, Package, PackageReference, Project, ProjectAnalyzerResult, Scope, VcsInfo,
};

const PROVIDER: &str = "NPM";

/// Backend for Node.js projects: reads `package.json` for project identity
/// and the sibling `package-lock.json` (v2/v3 `packages` map) for the pinned
/// dependency tree.
pub struct Npm {
    config: AnalyzerConfig,
}

impl Npm {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }
}

impl PackageManager for Npm {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn definition_files(&self) -> &'static [&'static str] {
        &["package.json"]
    }

    fn resolve_dependencies(
        &self,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<BTreeMap<PathBuf, ProjectAnalyzerResult>> {
        let mut results = BTreeMap::new();
        for file in files {
            debug!(file = %file.display(), "resolving NPM project");
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

/// One entry from the lock file's `packages` map, keyed by package name.
struct LockedPackage {
    version: String,
    license: String,
    optional: bool,
    /// Names of this package's own dependencies.
    dependencies: Vec<String>,
}

fn resolve_file(
    config: &AnalyzerConfig,
    root: &Path,
    manifest_path: &Path,
) -> Result<ProjectAnalyzerResult> {
    let working_dir = manifest_path.parent().unwrap_or(root);
    let manifest: Value = serde_json::from_str(&std::fs::read_to_string(manifest_path)?)?;

    let name = manifest
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| dir_name(working_dir));
    let (namespace, name) = split_scoped_name(&name);
    let version = manifest
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let mut project = Project::new(
        Identifier::new(PROVIDER, namespace, name, version),
        manifest_path.display().to_string(),
    );
    if let Some(license) = manifest.get("license").and_then(|v| v.as_str()) {
        project.declared_licenses.push(license.to_string());
    }
    if let Some(homepage) = manifest.get("homepage").and_then(|v| v.as_str()) {
        project.homepage_url = homepage.to_string();
    }
    if let Some(url) = repository_url(&manifest) {
        project.vcs = VcsInfo::new("Git", url, "");
    }
    project.vcs_processed = crate::vcs::clone_info(working_dir);

    let optional_names: BTreeSet<String> = object_keys(&manifest, "optionalDependencies").collect();
    let lock_path = working_dir.join("package-lock.json");
    let mut errors = Vec::new();
    let mut packages = BTreeSet::new();

    if lock_path.exists() {
        let lock: Value = serde_json::from_str(&std::fs::read_to_string(&lock_path)?)?;
        let index = index_lock(&lock);

        for (scope_name, section) in [
            ("dependencies", "dependencies"),
            ("devDependencies", "devDependencies"),
        ] {
            let mut declared: Vec<String> = object_keys(&manifest, section).collect();
            if section == "dependencies" {
                // npm installs optional dependencies alongside regular ones.
                declared.extend(optional_names.iter().cloned());
            }
            if declared.is_empty() {
                continue;
            }
            let references = declared
                .iter()
                .map(|dep_name| {
                    build_reference(&index, dep_name, &optional_names, &mut Vec::new(), &mut packages)
                })
                .collect();
            project.scopes.push(Scope::new(scope_name, references));
        }
    } else if config.allow_dynamic_versions {
        // No lock file: record the declared ranges, no transitive information.
        for (scope_name, section) in [
            ("dependencies", "dependencies"),
            ("devDependencies", "devDependencies"),
        ] {
            let Some(object) = manifest.get(section).and_then(|v| v.as_object()) else {
                continue;
            };
            let references = object
                .iter()
                .map(|(dep_name, range)| {
                    let (namespace, name) = split_scoped_name(dep_name);
                    let version = range.as_str().unwrap_or("*");
                    let id = Identifier::new(PROVIDER, namespace, name, version);
                    packages.insert(Package::new(id.clone()).curated());
                    PackageReference::new(id)
                })
                .collect();
            project.scopes.push(Scope::new(scope_name, references));
        }
    } else {
        errors.push(format!(
            "no package-lock.json found next to '{}' and dynamic versions are not allowed",
            manifest_path.display()
        ));
    }

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

/// `"@scope/pkg"` → `("@scope", "pkg")`; unscoped names get an empty namespace.
fn split_scoped_name(name: &str) -> (&str, &str) {
    match name.strip_prefix('@').and_then(|_| name.split_once('/')) {
        Some((scope, rest)) => (scope, rest),
        None => ("", name),
    }
}

fn repository_url(manifest: &Value) -> Option<&str> {
    let repository = manifest.get("repository")?;
    repository
        .as_str()
        .or_else(|| repository.get("url").and_then(|v| v.as_str()))
}

fn object_keys<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = String> + 'a {
    value
        .get(key)
        .and_then(|v| v.as_object())
        .into_iter()
        .flat_map(|object| object.keys().cloned())
}

/// Index the v2/v3 `packages` map by package name. The map is keyed by
/// install path (`node_modules/foo`, `node_modules/a/node_modules/foo`); the
/// name is everything after the last `node_modules/` segment. The shallowest
/// entry wins, matching npm's hoisting.
fn index_lock(lock: &Value) -> BTreeMap<String, LockedPackage> {
    let mut index: BTreeMap<String, LockedPackage> = BTreeMap::new();

    let Some(lock_packages) = lock.get("packages").and_then(|v| v.as_object()) else {
        return index;
    };

    let mut entries: Vec<(&String, &Value)> = lock_packages
        .iter()
        .filter(|(path, _)| !path.is_empty())
        .collect();
    entries.sort_by_key(|(path, _)| path.matches("node_modules/").count());

    for (path, info) in entries {
        let name = path
            .rsplit_once("node_modules/")
            .map(|(_, name)| name)
            .unwrap_or(path)
            .to_string();

        index.entry(name).or_insert_with(|| LockedPackage {
            version: info
                .get("version")
                .and_then(|v| v.as_str())
                .unwrap_or("*")
                .to_string(),
            license: info
                .get("license")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            optional: info.get("optional").and_then(|v| v.as_bool()).unwrap_or(false),
            dependencies: object_keys(info, "dependencies").collect(),
        });
    }

    index
}

/// Expand one dependency into a reference node. Optional dependencies that
/// npm chose not to install are represented as optional references without a
/// package; required ones missing from the lock file carry a node error.
fn build_reference(
    index: &BTreeMap<String, LockedPackage>,
    name: &str,
    root_optional: &BTreeSet<String>,
    ancestors: &mut Vec<String>,
    packages: &mut BTreeSet<crate::model::CuratedPackage>,
) -> PackageReference {
    let is_optional = root_optional.contains(name);
    let (namespace, short_name) = split_scoped_name(name);

    let Some(locked) = index.get(name) else {
        let mut reference =
            PackageReference::new(Identifier::new(PROVIDER, namespace, short_name, ""));
        if is_optional {
            reference.is_optional = true;
        } else {
            reference.errors.push(format!(
                "cannot resolve '{name}': not found in package-lock.json"
            ));
        }
        return reference;
    };

    let id = Identifier::new(PROVIDER, namespace, short_name, locked.version.clone());
    let mut reference = PackageReference::new(id.clone());
    reference.is_optional = is_optional || locked.optional;

    if ancestors.iter().any(|a| a == name) {
        reference
            .errors
            .push(format!("dependency cycle detected at '{id}'"));
        return reference;
    }

    let mut package = Package::new(id);
    if !locked.license.is_empty() {
        package.declared_licenses.push(locked.license.clone());
    }
    packages.insert(package.curated());

    ancestors.push(name.to_string());
    for dep_name in &locked.dependencies {
        reference.dependencies.push(build_reference(
            index,
            dep_name,
            root_optional,
            ancestors,
            packages,
        ));
    }
    ancestors.pop();

    reference
}
