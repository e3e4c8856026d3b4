use serde::{Deserialize, Serialize};

use super::curation::PackageCurationData;
use super::identifier::Identifier;
use super::vcs::VcsInfo;

/// A remote artifact location with an optional verification hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteArtifact {
    pub url: String,
    pub hash: String,
}

/// Metadata about a package as reported by a backend from upstream sources.
///
/// Immutable once produced; corrections go through the curation pipeline,
/// which builds new records instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Package {
    pub id: Identifier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_licenses: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage_url: String,
    #[serde(default)]
    pub binary_artifact: RemoteArtifact,
    #[serde(default)]
    pub source_artifact: RemoteArtifact,
    #[serde(default)]
    pub vcs: VcsInfo,
}

impl Package {
    /// A package known only by its identifier; all metadata fields empty.
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            declared_licenses: Vec::new(),
            description: String::new(),
            homepage_url: String::new(),
            binary_artifact: RemoteArtifact::default(),
            source_artifact: RemoteArtifact::default(),
            vcs: VcsInfo::default(),
        }
    }

    /// Wrap into a [`CuratedPackage`] with an empty audit trail.
    pub fn curated(self) -> CuratedPackage {
        CuratedPackage {
            package: self,
            curations: Vec::new(),
        }
    }
}

/// A package together with the curations that were applied to it, in
/// application order. The audit trail is append-only: applying a curation
/// produces a new `CuratedPackage`, it never rewrites an existing one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CuratedPackage {
    pub package: Package,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub curations: Vec<PackageCurationData>,
}

impl CuratedPackage {
    pub fn id(&self) -> &Identifier {
        &self.package.id
    }
}
