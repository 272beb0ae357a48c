//! Configuration
//!
//! Settings for every component, with defaults matching a stock DeepSea
//! layout. A YAML file may override any subset of them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// Constants
// =============================================================================

pub const DEFAULT_POLICY_FILE: &str = "/srv/pillar/ceph/proposals/policy1.cfg";
pub const DEFAULT_MINIONS_DIR: &str = "/srv/pillar/ceph/minions";
pub const DEFAULT_GLOBAL_FILE: &str = "/srv/pillar/ceph/global.yml";

// =============================================================================
// Settings
// =============================================================================

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub policy: PolicySettings,
    pub container: ContainerSettings,
    pub layout: CephLayout,
    pub salt: SaltSettings,
}

impl Settings {
    /// Load settings from a YAML file; missing sections keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_yaml::from_str(&contents)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Same settings with every file the tools write or delete moved under
    /// `root`. Used for dry runs.
    pub fn staged(&self, root: &Path) -> Self {
        Self {
            policy: self.policy.staged(root),
            container: self.container.clone(),
            layout: self.layout.rerooted(root),
            salt: self.salt.clone(),
        }
    }
}

/// Policy expansion paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Role -> target expression mapping
    pub policy_file: PathBuf,
    /// Directory receiving one `<minion>.sls` per node
    pub minions_dir: PathBuf,
    /// Cluster-global pillar file
    pub global_file: PathBuf,
}

impl PolicySettings {
    /// Outputs moved under `root`; the policy file is still read in place
    pub fn staged(&self, root: &Path) -> Self {
        Self {
            policy_file: self.policy_file.clone(),
            minions_dir: reroot(root, &self.minions_dir),
            global_file: reroot(root, &self.global_file),
        }
    }
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            policy_file: PathBuf::from(DEFAULT_POLICY_FILE),
            minions_dir: PathBuf::from(DEFAULT_MINIONS_DIR),
            global_file: PathBuf::from(DEFAULT_GLOBAL_FILE),
        }
    }
}

/// External programs used by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Container runtime binary, looked up in `PATH`
    pub runtime: String,
    /// Service manager binary, looked up in `PATH`
    pub systemctl: String,
    /// Default Ceph image
    pub image: Option<String>,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            runtime: "podman".to_string(),
            systemctl: "systemctl".to_string(),
            image: None,
        }
    }
}

/// Salt command line tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaltSettings {
    pub salt_call: String,
    pub salt: String,
}

impl Default for SaltSettings {
    fn default() -> Self {
        Self {
            salt_call: "salt-call".to_string(),
            salt: "salt".to_string(),
        }
    }
}

/// Host-side locations of Ceph state.
///
/// Container-side paths are fixed; these are the host directories mounted
/// onto them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CephLayout {
    pub lib_dir: PathBuf,
    pub etc_dir: PathBuf,
    pub run_dir: PathBuf,
    pub log_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub localtime: PathBuf,
    pub unit_dir: PathBuf,
    pub mgr_keyring_cache: PathBuf,
}

impl Default for CephLayout {
    fn default() -> Self {
        Self {
            lib_dir: PathBuf::from("/var/lib/ceph"),
            etc_dir: PathBuf::from("/etc/ceph"),
            run_dir: PathBuf::from("/var/run/ceph"),
            log_dir: PathBuf::from("/var/log/ceph"),
            tmp_dir: PathBuf::from("/tmp"),
            localtime: PathBuf::from("/etc/localtime"),
            unit_dir: PathBuf::from("/usr/lib/systemd/system"),
            mgr_keyring_cache: PathBuf::from("/srv/salt/ceph/mgr/cache"),
        }
    }
}

impl CephLayout {
    /// Default layout re-rooted under `root` (staging trees, tests)
    pub fn rooted(root: &Path) -> Self {
        Self::default().rerooted(root)
    }

    /// This layout re-rooted under `root`; `/etc/localtime` stays put
    pub fn rerooted(&self, root: &Path) -> Self {
        Self {
            lib_dir: reroot(root, &self.lib_dir),
            etc_dir: reroot(root, &self.etc_dir),
            run_dir: reroot(root, &self.run_dir),
            log_dir: reroot(root, &self.log_dir),
            tmp_dir: reroot(root, &self.tmp_dir),
            localtime: self.localtime.clone(),
            unit_dir: reroot(root, &self.unit_dir),
            mgr_keyring_cache: reroot(root, &self.mgr_keyring_cache),
        }
    }
}

fn reroot(root: &Path, path: &Path) -> PathBuf {
    root.join(path.strip_prefix("/").unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.policy.policy_file, PathBuf::from(DEFAULT_POLICY_FILE));
        assert_eq!(settings.container.runtime, "podman");
        assert_eq!(settings.layout.lib_dir, PathBuf::from("/var/lib/ceph"));
    }

    #[test]
    fn test_partial_override() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.yml");
        fs::write(
            &path,
            "container:\n  runtime: docker\npolicy:\n  minions_dir: /tmp/minions\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.container.runtime, "docker");
        assert_eq!(settings.container.systemctl, "systemctl");
        assert_eq!(settings.policy.minions_dir, PathBuf::from("/tmp/minions"));
        assert_eq!(settings.policy.global_file, PathBuf::from(DEFAULT_GLOBAL_FILE));
    }

    #[test]
    fn test_staged_settings() {
        let staged = Settings::default().staged(Path::new("/stage"));

        assert_eq!(staged.policy.policy_file, PathBuf::from(DEFAULT_POLICY_FILE));
        assert_eq!(
            staged.policy.minions_dir,
            PathBuf::from("/stage/srv/pillar/ceph/minions")
        );
        assert_eq!(
            staged.policy.global_file,
            PathBuf::from("/stage/srv/pillar/ceph/global.yml")
        );
        assert_eq!(staged.layout.lib_dir, PathBuf::from("/stage/var/lib/ceph"));
        assert_eq!(
            staged.layout.mgr_keyring_cache,
            PathBuf::from("/stage/srv/salt/ceph/mgr/cache")
        );
        assert_eq!(staged.layout.localtime, PathBuf::from("/etc/localtime"));
    }

    #[test]
    fn test_rooted_layout() {
        let layout = CephLayout::rooted(Path::new("/stage"));
        assert_eq!(layout.lib_dir, PathBuf::from("/stage/var/lib/ceph"));
        assert_eq!(layout.unit_dir, PathBuf::from("/stage/usr/lib/systemd/system"));
    }
}
