//! Cluster Global Pillar
//!
//! Writes the initial `global.yml` holding the cluster fsid. An existing file
//! is never replaced, so a bootstrapped cluster keeps its identity.

use crate::domain::ports::ExecutionContext;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

pub const MGMT_NETWORK_PLACEHOLDER: &str = "w.w.w.w";
pub const PUBLIC_NETWORK_PLACEHOLDER: &str = "x.x.x.x";
pub const CLUSTER_NETWORK_PLACEHOLDER: &str = "y.y.y.y";

/// Contents of the cluster-global pillar file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGlobalConfig {
    pub fsid: String,
    pub time_server: String,
    pub mgmt_network: String,
    pub public_network: String,
    pub cluster_network: String,
}

impl ClusterGlobalConfig {
    /// Fresh config with a new fsid and the master minion as time server
    pub fn generate(ctx: &dyn ExecutionContext) -> Result<Self> {
        Ok(Self::with_time_server(ctx.master_minion()?))
    }

    pub fn with_time_server(time_server: impl Into<String>) -> Self {
        Self {
            fsid: Uuid::new_v4().to_string(),
            time_server: time_server.into(),
            mgmt_network: MGMT_NETWORK_PLACEHOLDER.to_string(),
            public_network: PUBLIC_NETWORK_PLACEHOLDER.to_string(),
            cluster_network: CLUSTER_NETWORK_PLACEHOLDER.to_string(),
        }
    }

    /// Read an existing global pillar
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_yaml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Write to `path` unless it already exists.
    ///
    /// Returns `Ok(false)` and leaves the file untouched when present.
    pub fn write(&self, path: &Path) -> Result<bool> {
        let contents = serde_yaml::to_string(self)?;

        // Never clobber an existing fsid, even when racing another writer
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                info!("File {} already exists - not overwriting", path.display());
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(contents.as_bytes())?;

        info!("Wrote {} (fsid {})", path.display(), self.fsid);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticContext;
    use tempfile::TempDir;

    #[test]
    fn test_generate() {
        let ctx = StaticContext::new().with_master_minion("admin.ceph");
        let config = ClusterGlobalConfig::generate(&ctx).unwrap();

        assert_eq!(config.time_server, "admin.ceph");
        assert_eq!(config.public_network, PUBLIC_NETWORK_PLACEHOLDER);
        assert!(Uuid::parse_str(&config.fsid).is_ok());
    }

    #[test]
    fn test_write_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("global.yml");

        let first = ClusterGlobalConfig::with_time_server("admin");
        assert!(first.write(&path).unwrap());

        let second = ClusterGlobalConfig::with_time_server("admin");
        assert_ne!(first.fsid, second.fsid);
        assert!(!second.write(&path).unwrap());

        assert_eq!(ClusterGlobalConfig::load(&path).unwrap().fsid, first.fsid);
    }

    #[test]
    fn test_existing_file_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("global.yml");
        fs::write(&path, "fsid: operator-chosen\n").unwrap();

        assert!(!ClusterGlobalConfig::with_time_server("admin").write(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "fsid: operator-chosen\n");
    }

    #[test]
    fn test_written_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("global.yml");
        ClusterGlobalConfig::with_time_server("admin").write(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&contents).unwrap();
        for key in ["fsid", "time_server", "mgmt_network", "public_network", "cluster_network"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
