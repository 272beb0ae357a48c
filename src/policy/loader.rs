//! Role Policy Loader
//!
//! Reads the role -> target expression mapping (`policy.cfg`).

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Role name -> compound target expression, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePolicy {
    roles: IndexMap<String, String>,
}

impl RolePolicy {
    /// Build a policy from `(role, target)` pairs, keeping their order
    pub fn from_pairs<I, R, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, T)>,
        R: Into<String>,
        T: Into<String>,
    {
        Self {
            roles: pairs
                .into_iter()
                .map(|(role, target)| (role.into(), target.into()))
                .collect(),
        }
    }

    /// Read and parse a policy file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::PolicyMissing {
                path: path.to_path_buf(),
            });
        }

        let contents = fs::read_to_string(path)?;
        let policy = Self::parse(&contents).map_err(|e| {
            let (line, column) = e
                .location()
                .map(|loc| (loc.line(), loc.column()))
                .unwrap_or((0, 0));
            Error::PolicySyntax {
                path: path.to_path_buf(),
                line,
                column,
                message: e.to_string(),
            }
        })?;

        info!("Loaded {} roles from {}", policy.len(), path.display());
        debug!("Contents of {}: {:#?}", path.display(), policy.roles);
        Ok(policy)
    }

    fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let roles: Option<IndexMap<String, String>> = serde_yaml::from_str(contents)?;
        Ok(Self {
            roles: roles.unwrap_or_default(),
        })
    }

    /// Iterate `(role, target)` in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.roles.iter().map(|(r, t)| (r.as_str(), t.as_str()))
    }

    pub fn target(&self, role: &str) -> Option<&str> {
        self.roles.get(role).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
