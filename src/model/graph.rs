use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::vcs::VcsInfo;

/// A node in a project's dependency tree.
///
/// The tree is deliberately a tree and not a DAG: a package reached via two
/// different paths appears as two separate nodes so that path information is
/// preserved. Backends must not report cycles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageReference {
    pub id: Identifier,
    /// Marks a dependency the backend was not required to resolve; optional
    /// references may be absent from the result's package set.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageReference>,
    /// Errors local to resolving this node. A node with errors counts as
    /// unresolved and is exempt from the referential-integrity check.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl PackageReference {
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            is_optional: false,
            dependencies: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// A named group of root package references within one project, e.g.
/// "dependencies" vs "devDependencies". Names are unique per project and
/// keep the order the backend reported them in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageReference>,
}

impl Scope {
    pub fn new(name: impl Into<String>, dependencies: Vec<PackageReference>) -> Self {
        Self {
            name: name.into(),
            dependencies,
        }
    }
}

/// A project found in the analyzed source tree. The dependency tree is
/// implicitly contained in the scopes in the form of package references.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Project {
    pub id: Identifier,
    pub definition_file_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_licenses: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage_url: String,
    /// VCS location as declared in the definition file.
    #[serde(default)]
    pub vcs: VcsInfo,
    /// VCS location as actually found on disk.
    #[serde(default)]
    pub vcs_processed: VcsInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<Scope>,
}

impl Project {
    pub fn new(id: Identifier, definition_file_path: impl Into<String>) -> Self {
        Self {
            id,
            definition_file_path: definition_file_path.into(),
            declared_licenses: Vec::new(),
            homepage_url: String::new(),
            vcs: VcsInfo::default(),
            vcs_processed: VcsInfo::default(),
            scopes: Vec::new(),
        }
    }

    /// The synthetic project used when no package manager claims a directory.
    pub fn unmanaged(name: impl Into<String>, definition_file_path: impl Into<String>) -> Self {
        Self::new(
            Identifier::new("Unmanaged", "", name, ""),
            definition_file_path,
        )
    }

    /// Collect every identifier reachable from any scope's root references.
    ///
    /// With `required_only`, optional references and references carrying
    /// resolution errors are skipped; those are legitimately absent from a
    /// result's package set. Children are still visited either way.
    ///
    /// Uses an explicit worklist so pathologically deep trees cannot overflow
    /// the stack.
    pub fn collect_dependency_ids(&self, required_only: bool) -> BTreeSet<Identifier> {
        let mut ids = BTreeSet::new();
        let mut stack: Vec<&PackageReference> = self
            .scopes
            .iter()
            .flat_map(|scope| scope.dependencies.iter())
            .collect();

        while let Some(reference) = stack.pop() {
            let unresolved = reference.is_optional || !reference.errors.is_empty();
            if !(required_only && unresolved) {
                ids.insert(reference.id.clone());
            }
            stack.extend(reference.dependencies.iter());
        }

        ids
    }
}
