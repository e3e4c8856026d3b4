use std::fmt;

use serde::{Deserialize, Serialize};

/// The stable cross-reference key for projects and packages.
///
/// Identifiers order and compare by their four fields in declaration order;
/// two identifiers are equal iff all fields match exactly. There is no
/// semantic version comparison.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identifier {
    /// The package-manager ecosystem, e.g. "Cargo" or "NPM".
    pub provider: String,
    /// The namespace within the ecosystem, e.g. an npm scope. Often empty.
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl Identifier {
    pub fn new(
        provider: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.provider, self.namespace, self.name, self.version
        )
    }
}

/// Parse the `provider:namespace:name:version` form, padding missing trailing
/// components with empty strings.
impl From<String> for Identifier {
    fn from(s: String) -> Self {
        let mut parts = s.splitn(4, ':');
        let mut next = || parts.next().unwrap_or("").to_string();
        Self {
            provider: next(),
            namespace: next(),
            name: next(),
            version: next(),
        }
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

impl std::str::FromStr for Identifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}
