use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tracing::{error, info};

use crate::backend::{self, unmanaged::Unmanaged, PackageManager};
use crate::config::AnalyzerConfig;
use crate::curation::{self, CurationProvider};
use crate::model::{AnalyzerResultBuilder, ProjectAnalyzerResult};
use crate::vcs;

/// Run a full analysis: discover definition files under `root`, resolve each
/// package manager's files, apply curations, and aggregate everything.
///
/// Resolution runs concurrently across package managers — each owns its own
/// file list and produces an independent result, so there is no shared state
/// until aggregation. The builder is mutated only from this task, preserving
/// its single-writer contract. One manager timing out or failing records
/// errors for its files and never affects the others in flight.
pub async fn analyze(
    config: &AnalyzerConfig,
    root: &Path,
    managers: Vec<Arc<dyn PackageManager>>,
    provider: Arc<dyn CurationProvider>,
) -> Result<AnalyzerResultBuilder> {
    let mut managed_files = if managers.len() == 1 && root.is_file() {
        // A single activated package manager may be pointed at one exact
        // definition file, regardless of the file's name.
        vec![(Arc::clone(&managers[0]), vec![root.to_path_buf()])]
    } else {
        backend::find_managed_files(root, &managers)?
    };

    let has_root_definition = managed_files
        .iter()
        .flat_map(|(_, files)| files.iter())
        .any(|file| file.parent() == Some(root) || file.as_path() == root);
    if managed_files.is_empty() || !has_root_definition {
        let sentinel: Arc<dyn PackageManager> = Arc::new(Unmanaged::new(config.clone()));
        managed_files.push((sentinel, vec![root.to_path_buf()]));
    }

    for (manager, files) in &managed_files {
        info!(
            manager = manager.name(),
            count = files.len(),
            files = %display_files(files, root),
            "definition files found"
        );
    }

    let clone_info = vcs::clone_info(root);
    let mut builder = AnalyzerResultBuilder::new(config.clone(), clone_info);

    let timeout = Duration::from_secs(config.resolution_timeout_secs);
    let root = root.to_path_buf();

    let tasks = managed_files.into_iter().map(|(manager, files)| {
        let root = root.clone();
        async move {
            let task_manager = Arc::clone(&manager);
            let task_files = files.clone();
            let handle = tokio::task::spawn_blocking(move || {
                task_manager.resolve_dependencies(&root, &task_files)
            });
            let outcome = tokio::time::timeout(timeout, handle).await;
            (manager, files, outcome)
        }
    });

    for (manager, files, outcome) in join_all(tasks).await {
        let results = match outcome {
            Ok(Ok(Ok(results))) => results,
            Ok(Ok(Err(err))) => {
                error!(manager = manager.name(), "resolution failed: {err:#}");
                failed_results(config, &manager, &files, format!("resolution failed: {err:#}"))
            }
            Ok(Err(join_error)) => {
                error!(manager = manager.name(), "resolution panicked: {join_error}");
                failed_results(
                    config,
                    &manager,
                    &files,
                    format!("resolution panicked: {join_error}"),
                )
            }
            Err(_) => {
                error!(manager = manager.name(), "resolution timed out");
                failed_results(
                    config,
                    &manager,
                    &files,
                    format!(
                        "resolution timed out after {} seconds",
                        config.resolution_timeout_secs
                    ),
                )
            }
        };

        for (_, result) in results {
            let curated = curation::apply_curations(provider.as_ref(), result);
            builder.add_result(curated);
        }
    }

    Ok(builder)
}

/// One error-carrying result per definition file, so a fully failed backend
/// still accounts for every file it was given.
fn failed_results(
    config: &AnalyzerConfig,
    manager: &Arc<dyn PackageManager>,
    files: &[PathBuf],
    message: String,
) -> BTreeMap<PathBuf, ProjectAnalyzerResult> {
    files
        .iter()
        .map(|file| {
            (
                file.clone(),
                backend::error_result(config.clone(), manager.name(), file, message.clone()),
            )
        })
        .collect()
}

fn display_files(files: &[PathBuf], root: &Path) -> String {
    files
        .iter()
        .map(|file| {
            file.strip_prefix(root)
                .unwrap_or(file)
                .display()
                .to_string()
        })
        .map(|s| if s.is_empty() { ".".to_string() } else { s })
        .collect::<Vec<_>>()
        .join(", ")
}
