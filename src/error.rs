use thiserror::Error;

use crate::model::Identifier;

/// Errors raised to the caller as hard failures.
///
/// Per-node and backend-level resolution problems are *not* represented here;
/// they are absorbed into the data model as error strings and surfaced through
/// [`collect_errors`](crate::model::ProjectAnalyzerResult::collect_errors).
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// A project references identifiers that are missing from the package set.
    /// This signals a backend bug and must never produce a silent, inconsistent
    /// result.
    #[error(
        "project '{project}' references packages that are not in the package set: [{}]",
        .ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    DanglingReferences {
        project: Identifier,
        ids: Vec<Identifier>,
    },

    /// Two analyzer results reported the same project identifier.
    #[error("duplicate project identifier '{0}' across analyzer results")]
    DuplicateProject(Identifier),

    /// A curation was handed a package its identifier does not match.
    #[error("curation for '{curation}' does not apply to package '{package}'")]
    CurationMismatch {
        curation: Identifier,
        package: Identifier,
    },
}
