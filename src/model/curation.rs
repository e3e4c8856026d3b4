use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::package::{CuratedPackage, RemoteArtifact};
use super::vcs::VcsInfo;
use crate::error::AnalyzerError;

/// Field-level overrides for a package's metadata. Only `Some` fields are
/// applied; everything else is kept from the package being curated.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageCurationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_licenses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_artifact: Option<RemoteArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_artifact: Option<RemoteArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcs: Option<VcsInfo>,
}

/// A user-supplied correction for the package matching [`PackageCuration::id`].
///
/// An empty or `"*"` version in the target identifier matches any version of
/// the package; the other fields must match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCuration {
    pub id: Identifier,
    pub data: PackageCurationData,
}

impl PackageCuration {
    pub fn is_applicable(&self, pkg_id: &Identifier) -> bool {
        self.id.provider == pkg_id.provider
            && self.id.namespace == pkg_id.namespace
            && self.id.name == pkg_id.name
            && (self.id.version.is_empty()
                || self.id.version == "*"
                || self.id.version == pkg_id.version)
    }

    /// Apply this curation, producing a new [`CuratedPackage`] with the
    /// overridden fields and this curation appended to the audit trail.
    ///
    /// Pure function: the input is not modified. Fails if the curation does
    /// not target the package's identifier.
    pub fn apply(&self, curated: &CuratedPackage) -> Result<CuratedPackage, AnalyzerError> {
        if !self.is_applicable(curated.id()) {
            return Err(AnalyzerError::CurationMismatch {
                curation: self.id.clone(),
                package: curated.id().clone(),
            });
        }

        let mut package = curated.package.clone();
        if let Some(licenses) = &self.data.declared_licenses {
            package.declared_licenses = licenses.clone();
        }
        if let Some(description) = &self.data.description {
            package.description = description.clone();
        }
        if let Some(homepage_url) = &self.data.homepage_url {
            package.homepage_url = homepage_url.clone();
        }
        if let Some(binary_artifact) = &self.data.binary_artifact {
            package.binary_artifact = binary_artifact.clone();
        }
        if let Some(source_artifact) = &self.data.source_artifact {
            package.source_artifact = source_artifact.clone();
        }
        if let Some(vcs) = &self.data.vcs {
            package.vcs = vcs.clone();
        }

        let mut curations = curated.curations.clone();
        curations.push(self.data.clone());

        Ok(CuratedPackage { package, curations })
    }
}
