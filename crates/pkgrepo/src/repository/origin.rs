use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RepositoryError;

/// Where a package comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginType {
    Local,
    Archive,
    Registry,
    Vcs,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginType::Local => "local",
            OriginType::Archive => "archive",
            OriginType::Registry => "registry",
            OriginType::Vcs => "vcs",
        }
    }

    /// Log target used by repositories of this origin
    pub fn log_target(&self) -> &'static str {
        match self {
            OriginType::Local => "local-repos",
            OriginType::Archive => "archive-repos",
            OriginType::Registry => "registry-repos",
            OriginType::Vcs => "vcs-repos",
        }
    }
}

impl fmt::Display for OriginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OriginType {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(OriginType::Local),
            "archive" => Ok(OriginType::Archive),
            "registry" => Ok(OriginType::Registry),
            "vcs" | "git" => Ok(OriginType::Vcs),
            other => Err(RepositoryError::UnknownSource(format!("origin type \"{}\"", other))),
        }
    }
}
