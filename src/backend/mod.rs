use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::AnalyzerConfig;
use crate::model::{Identifier, Project, ProjectAnalyzerResult};

pub mod cargo;
pub mod npm;
pub mod pip;
pub mod unmanaged;

/// One package-manager ecosystem backend.
///
/// Contract the engine relies on:
/// - `resolve_dependencies` is synchronous from the engine's point of view
///   (it may block on external processes internally).
/// - Ordinary resolution failures never surface as `Err`; they are captured
///   in the returned results, either as top-level errors or on the offending
///   [`PackageReference`](crate::model::PackageReference). `Err` is reserved
///   for failures the backend could not attribute to a file, and aborts only
///   this backend's files, not the run.
/// - Exactly one result per input file; a file is never silently dropped.
pub trait PackageManager: Send + Sync {
    /// The stable name identifying this backend, e.g. "Cargo".
    fn name(&self) -> &'static str;

    /// Definition file names claimed by this backend, matched exactly.
    fn definition_files(&self) -> &'static [&'static str];

    fn resolve_dependencies(
        &self,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<BTreeMap<PathBuf, ProjectAnalyzerResult>>;
}

/// The closed, statically-registered set of backends. Adding one is a
/// deployment-time decision. The unmanaged sentinel is not part of the
/// registry; the engine adds it as a fallback.
pub fn all(config: &AnalyzerConfig) -> Vec<Arc<dyn PackageManager>> {
    vec![
        Arc::new(cargo::Cargo::new(config.clone())),
        Arc::new(npm::Npm::new(config.clone())),
        Arc::new(pip::Pip::new(config.clone())),
    ]
}

/// Walk the tree under `root` once and map each active backend to the
/// definition files it claims, in discovery order.
///
/// A file may be claimed by more than one backend; no deduplication happens
/// across backends. Hidden directories and common dependency/build output
/// directories are not descended into. An unreadable tree is a fatal error —
/// discovery cannot proceed without a file list.
pub fn find_managed_files(
    root: &Path,
    managers: &[Arc<dyn PackageManager>],
) -> Result<Vec<(Arc<dyn PackageManager>, Vec<PathBuf>)>> {
    let mut files_per_manager: Vec<Vec<PathBuf>> = vec![Vec::new(); managers.len()];

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        for (index, manager) in managers.iter().enumerate() {
            if manager.definition_files().contains(&file_name) {
                files_per_manager[index].push(entry.path().to_path_buf());
            }
        }
    }

    Ok(managers
        .iter()
        .zip(files_per_manager)
        .filter(|(_, files)| !files.is_empty())
        .map(|(manager, files)| (Arc::clone(manager), files))
        .collect())
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    match entry.file_name().to_str() {
        Some(name) => name.starts_with('.') || name == "node_modules" || name == "target",
        None => true,
    }
}

/// A result standing in for a definition file whose resolution failed
/// entirely: a synthetic project carrying the failure as its only content.
/// The project is named after the file path so two failed files never
/// collide on one identifier.
pub fn error_result(
    config: AnalyzerConfig,
    provider: &str,
    definition_file: &Path,
    message: String,
) -> ProjectAnalyzerResult {
    let project = Project::new(
        Identifier::new(provider, "", definition_file.display().to_string(), ""),
        definition_file.display().to_string(),
    );

    ProjectAnalyzerResult {
        config,
        project,
        packages: BTreeSet::new(),
        errors: vec![message],
    }
}
