//! The immutable value types describing an analysis: identities, packages,
//! curations, dependency trees, and the per-backend and aggregate results.

mod curation;
mod graph;
mod identifier;
mod package;
mod result;
mod vcs;

pub use curation::{PackageCuration, PackageCurationData};
pub use graph::{PackageReference, Project, Scope};
pub use identifier::Identifier;
pub use package::{CuratedPackage, Package, RemoteArtifact};
pub use result::{AnalyzerResult, AnalyzerResultBuilder, ProjectAnalyzerResult};
pub use vcs::VcsInfo;
