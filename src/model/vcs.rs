use serde::{Deserialize, Serialize};

/// Version control information for a project or package.
///
/// A read-only fact; empty fields mean "unknown". Failure to determine clone
/// information degrades to [`VcsInfo::default`], it is never fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsInfo {
    /// The type of VCS, e.g. "Git". Empty if unknown.
    #[serde(rename = "type")]
    pub vcs_type: String,
    pub url: String,
    pub revision: String,
}

impl VcsInfo {
    pub fn new(
        vcs_type: impl Into<String>,
        url: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            vcs_type: vcs_type.into(),
            url: url.into(),
            revision: revision.into(),
        }
    }
}
