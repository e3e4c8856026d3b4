use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::graph::{PackageReference, Project};
use super::identifier::Identifier;
use super::package::CuratedPackage;
use super::vcs::VcsInfo;
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;

/// Everything one backend produced for one definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalyzerResult {
    /// Snapshot of the configuration the result was produced under.
    pub config: AnalyzerConfig,
    pub project: Project,
    /// The packages used by the project, sorted by identifier.
    pub packages: BTreeSet<CuratedPackage>,
    /// Errors that hit the whole resolution rather than a single node,
    /// e.g. a crashed external tool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ProjectAnalyzerResult {
    /// Build a result, verifying referential integrity: every identifier the
    /// project's scopes reference as resolved must be present in `packages`.
    /// Optional and errored references are exempt — a backend may choose not
    /// to fetch them.
    pub fn new(
        config: AnalyzerConfig,
        project: Project,
        packages: BTreeSet<CuratedPackage>,
        errors: Vec<String>,
    ) -> Result<Self, AnalyzerError> {
        let package_ids: BTreeSet<&Identifier> = packages.iter().map(CuratedPackage::id).collect();
        let missing: Vec<Identifier> = project
            .collect_dependency_ids(true)
            .into_iter()
            .filter(|id| !package_ids.contains(id))
            .collect();

        if !missing.is_empty() {
            return Err(AnalyzerError::DanglingReferences {
                project: project.id,
                ids: missing,
            });
        }

        Ok(Self {
            config,
            project,
            packages,
            errors,
        })
    }

    /// True if any top-level error exists or any reference anywhere in any
    /// scope's tree carries errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || scope_trees_have_errors(&self.project)
    }

    /// Flatten the nested dependency trees into a per-identifier error report.
    ///
    /// Each node's errors are recorded under its own identifier, top-level
    /// errors under the project's identifier. Within one identifier the list
    /// is deduplicated preserving first occurrence; identical messages under
    /// different identifiers are kept.
    pub fn collect_errors(&self) -> BTreeMap<Identifier, Vec<String>> {
        let mut collected: BTreeMap<Identifier, Vec<String>> = BTreeMap::new();

        if !self.errors.is_empty() {
            collected.insert(self.project.id.clone(), self.errors.clone());
        }
        collect_tree_errors(&self.project, &mut collected);

        collected
            .into_iter()
            .map(|(id, errors)| (id, dedup_preserving_order(errors)))
            .collect()
    }
}

fn scope_trees_have_errors(project: &Project) -> bool {
    let mut stack: Vec<&PackageReference> = project
        .scopes
        .iter()
        .flat_map(|scope| scope.dependencies.iter())
        .collect();

    while let Some(reference) = stack.pop() {
        if !reference.errors.is_empty() {
            return true;
        }
        stack.extend(reference.dependencies.iter());
    }

    false
}

fn collect_tree_errors(project: &Project, collected: &mut BTreeMap<Identifier, Vec<String>>) {
    let mut stack: Vec<&PackageReference> = project
        .scopes
        .iter()
        .flat_map(|scope| scope.dependencies.iter())
        .collect();

    while let Some(reference) = stack.pop() {
        if !reference.errors.is_empty() {
            collected
                .entry(reference.id.clone())
                .or_default()
                .extend(reference.errors.iter().cloned());
        }
        stack.extend(reference.dependencies.iter());
    }
}

fn dedup_preserving_order(errors: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|error| seen.insert(error.clone()))
        .collect()
}

/// The merged output of a whole analysis run. Frozen once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub config: AnalyzerConfig,
    /// Clone information for the analyzed root directory.
    pub vcs: VcsInfo,
    /// All analyzed projects, sorted by identifier.
    pub projects: Vec<Project>,
    /// The union of all curated packages, deduplicated by identifier and
    /// sorted by identifier.
    pub packages: Vec<CuratedPackage>,
    /// Top-level errors keyed by the project they belong to.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<Identifier, Vec<String>>,
}

impl AnalyzerResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.projects.iter().any(scope_trees_have_errors)
    }

    /// The per-identifier error report over all projects, with the same
    /// dedup semantics as [`ProjectAnalyzerResult::collect_errors`].
    pub fn collect_errors(&self) -> BTreeMap<Identifier, Vec<String>> {
        let mut collected: BTreeMap<Identifier, Vec<String>> = self
            .errors
            .iter()
            .map(|(id, errors)| (id.clone(), errors.clone()))
            .collect();

        for project in &self.projects {
            collect_tree_errors(project, &mut collected);
        }

        collected
            .into_iter()
            .map(|(id, errors)| (id, dedup_preserving_order(errors)))
            .collect()
    }
}

/// Accumulates per-backend results into one [`AnalyzerResult`].
///
/// This is the single stateful object in the engine. Mutation must be
/// serialized: one task owns the builder and feeds results into it, backends
/// only ever hand over finished values.
#[derive(Debug)]
pub struct AnalyzerResultBuilder {
    config: AnalyzerConfig,
    vcs: VcsInfo,
    projects: Vec<Project>,
    packages: BTreeMap<Identifier, CuratedPackage>,
    errors: BTreeMap<Identifier, Vec<String>>,
}

impl AnalyzerResultBuilder {
    pub fn new(config: AnalyzerConfig, vcs: VcsInfo) -> Self {
        Self {
            config,
            vcs,
            projects: Vec::new(),
            packages: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    /// Merge one result into the aggregate.
    ///
    /// Project identifiers must be unique across the run; a duplicate is a
    /// configuration error recorded under that identifier, never a silent
    /// merge. Packages union by identifier with the first-seen entry winning —
    /// ecosystems routinely share transitive dependencies.
    pub fn add_result(&mut self, result: ProjectAnalyzerResult) {
        let project_id = result.project.id.clone();

        if self.projects.iter().any(|p| p.id == project_id) {
            let error = AnalyzerError::DuplicateProject(project_id.clone()).to_string();
            warn!(project = %project_id, "{error}");
            self.errors.entry(project_id.clone()).or_default().push(error);
        } else {
            self.projects.push(result.project);
        }

        for package in result.packages {
            self.packages.entry(package.id().clone()).or_insert(package);
        }

        if !result.errors.is_empty() {
            self.errors
                .entry(project_id)
                .or_default()
                .extend(result.errors);
        }
    }

    /// Freeze the aggregate into an immutable snapshot.
    ///
    /// Projects are sorted by identifier so the output is deterministic
    /// regardless of backend completion order. The global referential
    /// integrity invariant is re-validated here; a violation means a backend
    /// reported a dependency it never added to its package set, and the
    /// caller must not trust the result.
    ///
    /// Non-consuming and idempotent: calling `build` twice without an
    /// intervening `add_result` yields structurally equal results.
    pub fn build(&self) -> Result<AnalyzerResult, AnalyzerError> {
        let mut projects = self.projects.clone();
        projects.sort_by(|a, b| a.id.cmp(&b.id));

        for project in &projects {
            let missing: Vec<Identifier> = project
                .collect_dependency_ids(true)
                .into_iter()
                .filter(|id| !self.packages.contains_key(id))
                .collect();

            if !missing.is_empty() {
                return Err(AnalyzerError::DanglingReferences {
                    project: project.id.clone(),
                    ids: missing,
                });
            }
        }

        Ok(AnalyzerResult {
            config: self.config.clone(),
            vcs: self.vcs.clone(),
            projects,
            packages: self.packages.values().cloned().collect(),
            errors: self.errors.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Package, Scope};

    fn id(name: &str) -> Identifier {
        Identifier::new("Cargo", "", name, "1.0.0")
    }

    fn package(name: &str) -> CuratedPackage {
        Package::new(id(name)).curated()
    }

    fn project(name: &str, references: Vec<PackageReference>) -> Project {
        let mut project = Project::new(id(name), format!("{name}/Cargo.toml"));
        project.scopes.push(Scope::new("dependencies", references));
        project
    }

    fn result_with(
        name: &str,
        references: Vec<PackageReference>,
        packages: Vec<CuratedPackage>,
        errors: Vec<String>,
    ) -> Result<ProjectAnalyzerResult, AnalyzerError> {
        ProjectAnalyzerResult::new(
            AnalyzerConfig::default(),
            project(name, references),
            packages.into_iter().collect(),
            errors,
        )
    }

    #[test]
    fn test_construction_rejects_dangling_references() {
        let err = result_with("app", vec![PackageReference::new(id("ghost"))], vec![], vec![])
            .unwrap_err();
        match err {
            AnalyzerError::DanglingReferences { ids, .. } => assert_eq!(ids, vec![id("ghost")]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_and_errored_references_are_exempt() {
        let mut optional = PackageReference::new(id("optional"));
        optional.is_optional = true;
        let mut errored = PackageReference::new(id("errored"));
        errored.errors.push("fetch failed".to_string());

        let result = result_with("app", vec![optional, errored], vec![], vec![]).unwrap();
        assert!(result.has_errors());
    }

    #[test]
    fn test_has_errors_on_clean_tree() {
        let result = result_with(
            "app",
            vec![PackageReference::new(id("dep"))],
            vec![package("dep")],
            vec![],
        )
        .unwrap();
        assert!(!result.has_errors());
    }

    #[test]
    fn test_has_errors_finds_deeply_nested_node() {
        let mut leaf = PackageReference::new(id("leaf"));
        leaf.errors.push("broken".to_string());
        let mut mid = PackageReference::new(id("mid"));
        mid.dependencies.push(leaf);
        let mut root = PackageReference::new(id("root-dep"));
        root.dependencies.push(mid);

        let result = result_with(
            "app",
            vec![root],
            vec![package("root-dep"), package("mid")],
            vec![],
        )
        .unwrap();
        assert!(result.has_errors());
    }

    #[test]
    fn test_collect_errors_dedups_within_one_identifier() {
        let mut reference = PackageReference::new(id("x"));
        reference.errors = vec!["e1".to_string(), "e1".to_string(), "e2".to_string()];

        let result = result_with("app", vec![reference], vec![], vec![]).unwrap();
        let collected = result.collect_errors();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[&id("x")], vec!["e1".to_string(), "e2".to_string()]);
    }

    #[test]
    fn test_collect_errors_attaches_top_level_to_project() {
        let result = result_with("app", vec![], vec![], vec!["tool crashed".to_string()]).unwrap();
        let collected = result.collect_errors();
        assert_eq!(collected[&id("app")], vec!["tool crashed".to_string()]);
    }

    #[test]
    fn test_collect_errors_keeps_same_message_across_identifiers() {
        let mut a = PackageReference::new(id("a"));
        a.errors.push("timeout".to_string());
        let mut b = PackageReference::new(id("b"));
        b.errors.push("timeout".to_string());

        let result = result_with("app", vec![a, b], vec![], vec![]).unwrap();
        let collected = result.collect_errors();
        assert_eq!(collected.len(), 2);
    }

    #[test]
    fn test_builder_dedups_packages_first_seen_wins() {
        let mut first = Package::new(id("q"));
        first.description = "first".to_string();
        let mut second = Package::new(id("q"));
        second.description = "second".to_string();

        let mut builder = AnalyzerResultBuilder::new(AnalyzerConfig::default(), VcsInfo::default());
        builder.add_result(
            result_with(
                "one",
                vec![PackageReference::new(id("q"))],
                vec![first.clone().curated()],
                vec![],
            )
            .unwrap(),
        );
        builder.add_result(
            result_with(
                "two",
                vec![PackageReference::new(id("q"))],
                vec![second.curated()],
                vec![],
            )
            .unwrap(),
        );

        let result = builder.build().unwrap();
        assert_eq!(result.packages.len(), 1);
        assert_eq!(result.packages[0].package, first);
    }

    #[test]
    fn test_builder_records_duplicate_project_as_error() {
        let mut builder = AnalyzerResultBuilder::new(AnalyzerConfig::default(), VcsInfo::default());
        builder.add_result(result_with("app", vec![], vec![], vec![]).unwrap());
        builder.add_result(result_with("app", vec![], vec![], vec![]).unwrap());

        let result = builder.build().unwrap();
        assert_eq!(result.projects.len(), 1);
        assert!(result.errors[&id("app")][0].contains("duplicate project"));
        assert!(result.has_errors());
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut builder = AnalyzerResultBuilder::new(AnalyzerConfig::default(), VcsInfo::default());
        builder.add_result(
            result_with(
                "app",
                vec![PackageReference::new(id("dep"))],
                vec![package("dep")],
                vec!["warning".to_string()],
            )
            .unwrap(),
        );

        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_sorts_projects_by_identifier() {
        let mut builder = AnalyzerResultBuilder::new(AnalyzerConfig::default(), VcsInfo::default());
        builder.add_result(result_with("zebra", vec![], vec![], vec![]).unwrap());
        builder.add_result(result_with("aardvark", vec![], vec![], vec![]).unwrap());

        let result = builder.build().unwrap();
        let names: Vec<&str> = result.projects.iter().map(|p| p.id.name.as_str()).collect();
        assert_eq!(names, vec!["aardvark", "zebra"]);
    }

    #[test]
    fn test_build_revalidates_global_invariant() {
        // Assemble a result that bypasses the validating constructor, the way
        // a buggy backend would.
        let inconsistent = ProjectAnalyzerResult {
            config: AnalyzerConfig::default(),
            project: project("app", vec![PackageReference::new(id("ghost"))]),
            packages: BTreeSet::new(),
            errors: Vec::new(),
        };

        let mut builder = AnalyzerResultBuilder::new(AnalyzerConfig::default(), VcsInfo::default());
        builder.add_result(inconsistent);
        assert!(matches!(
            builder.build(),
            Err(AnalyzerError::DanglingReferences { .. })
        ));
    }
}
