//! Node Role Assignment
//!
//! Inverts the resolved policy into minion -> roles and writes one pillar
//! file per minion.

use crate::domain::ports::NodeId;
use crate::error::{Error, Result};
use crate::policy::resolver::ResolvedPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Prefix removed from role names in the written pillar
pub const ROLE_PREFIX: &str = "role-";

/// Strip exactly one leading [`ROLE_PREFIX`] from a role name.
///
/// `role-mon` becomes `mon`, `osd` is unchanged and `role-role-x` becomes
/// `role-x`.
pub fn strip_role_prefix(role: &str) -> &str {
    role.strip_prefix(ROLE_PREFIX).unwrap_or(role)
}

/// Contents of a `<minion>.sls` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesPillar {
    pub roles: Vec<String>,
}

impl RolesPillar {
    fn from_roles(roles: &[String]) -> Self {
        Self {
            roles: roles
                .iter()
                .map(|role| strip_role_prefix(role).to_string())
                .collect(),
        }
    }
}

/// Minion -> roles, roles in policy encounter order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRoleAssignment {
    nodes: BTreeMap<NodeId, Vec<String>>,
}

impl NodeRoleAssignment {
    /// Invert role -> minions into minion -> roles
    pub fn invert(resolved: &ResolvedPolicy) -> Self {
        let mut nodes: BTreeMap<NodeId, Vec<String>> = BTreeMap::new();
        for (role, members) in resolved.iter() {
            for node in members {
                nodes.entry(node.clone()).or_default().push(role.to_string());
            }
        }
        debug!("Minions: {:#?}", nodes);
        Self { nodes }
    }

    /// Iterate `(minion, roles)` sorted by minion
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.nodes
            .iter()
            .map(|(node, roles)| (node.as_str(), roles.as_slice()))
    }

    pub fn roles_for(&self, node: &str) -> Option<&[String]> {
        self.nodes.get(node).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pillar contents for one minion, prefixes stripped
    pub fn pillar_for(&self, node: &str) -> Option<RolesPillar> {
        self.nodes.get(node).map(|roles| RolesPillar::from_roles(roles))
    }

    /// Write `<dir>/<minion>.sls` for every minion.
    ///
    /// Returns `Ok(false)` when `dir` cannot be created for lack of
    /// permission. Any other failure, including a failed file write, is an
    /// error.
    pub fn write(&self, dir: &Path) -> Result<bool> {
        match prepare_dir(dir) {
            Ok(()) => {}
            Err(e @ Error::DirectoryAccessDenied { .. }) => {
                error!("{}", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        for (node, roles) in &self.nodes {
            let path = minion_file(dir, node);
            let pillar = RolesPillar::from_roles(roles);
            let contents = serde_yaml::to_string(&pillar)?;
            info!("Writing {}", path.display());
            debug!("Contents {:?}", pillar);
            fs::write(&path, contents)?;
        }

        Ok(true)
    }
}

/// Path of a minion's role pillar file
pub fn minion_file(dir: &Path, node: &str) -> PathBuf {
    dir.join(format!("{}.sls", node))
}

/// Create `dir` and its parents, mapping permission denial to
/// [`Error::DirectoryAccessDenied`]
pub fn prepare_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => Error::DirectoryAccessDenied {
            path: dir.to_path_buf(),
        },
        _ => Error::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn test_strip_role_prefix() {
        assert_eq!(strip_role_prefix("role-mon"), "mon");
        assert_eq!(strip_role_prefix("osd"), "osd");
        assert_eq!(strip_role_prefix("role-role-x"), "role-x");
        assert_eq!(strip_role_prefix("roleplay-x"), "roleplay-x");
    }

    #[test]
    fn test_invert_shared_nodes() {
        let resolved = ResolvedPolicy::from_pairs([("mon", ["a", "b"]), ("osd", ["a", "b"])]);
        let assignment = NodeRoleAssignment::invert(&resolved);

        assert_eq!(assignment.len(), 2);
        assert_eq!(assignment.roles_for("a").unwrap(), ["mon", "osd"]);
        assert_eq!(assignment.roles_for("b").unwrap(), ["mon", "osd"]);
    }

    #[test]
    fn test_minions_are_union_of_resolved_sets() {
        let resolved = ResolvedPolicy::from_pairs([
            ("mon", vec!["a", "b"]),
            ("osd", vec!["c", "d"]),
            ("rgw", vec!["e"]),
            ("mgr", vec![]),
        ]);
        let assignment = NodeRoleAssignment::invert(&resolved);

        let minions: BTreeSet<NodeId> = assignment
            .iter()
            .map(|(node, _)| node.to_string())
            .collect();
        assert_eq!(minions, resolved.nodes());
        assert_eq!(assignment.len(), 5);
        assert_eq!(assignment.roles_for("e").unwrap(), ["rgw"]);
    }

    #[test]
    fn test_reinversion_reproduces_resolved_sets() {
        let resolved = ResolvedPolicy::from_pairs([
            ("mon", vec!["a", "b"]),
            ("osd", vec!["b", "c"]),
            ("mgr", vec![]),
        ]);
        let assignment = NodeRoleAssignment::invert(&resolved);
        let reinverted = ResolvedPolicy::from_assignment(&assignment);

        for (role, nodes) in resolved.iter().filter(|(_, nodes)| !nodes.is_empty()) {
            assert_eq!(reinverted.nodes_for(role), Some(nodes), "role {}", role);
        }
        // Roles without minions have nothing to re-invert from
        assert_eq!(reinverted.nodes_for("mgr"), None);
        assert_eq!(reinverted.len(), 2);
    }

    #[test]
    fn test_invert_keeps_encounter_order() {
        let resolved = ResolvedPolicy::from_pairs([
            ("storage", vec!["a"]),
            ("admin", vec!["a"]),
            ("mgr", vec![]),
        ]);
        let assignment = NodeRoleAssignment::invert(&resolved);

        assert_eq!(assignment.roles_for("a").unwrap(), ["storage", "admin"]);
        assert_eq!(assignment.len(), 1);
    }

    #[test]
    fn test_write_minion_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("pillar/ceph/minions");
        let resolved = ResolvedPolicy::from_pairs([
            ("role-mon", vec!["a"]),
            ("role-role-x", vec!["a", "b"]),
        ]);

        let assignment = NodeRoleAssignment::invert(&resolved);
        assert!(assignment.write(&dir).unwrap());

        let a: RolesPillar =
            serde_yaml::from_str(&fs::read_to_string(dir.join("a.sls")).unwrap()).unwrap();
        assert_eq!(a.roles, vec!["mon", "role-x"]);
        assert_eq!(assignment.pillar_for("a"), Some(a));
        assert_eq!(assignment.pillar_for("c"), None);

        let b = fs::read_to_string(dir.join("b.sls")).unwrap();
        assert_eq!(b, "roles:\n- role-x\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let locked = tmp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

        // root ignores directory permissions
        if fs::write(locked.join("probe"), "").is_ok() {
            return;
        }

        let resolved = ResolvedPolicy::from_pairs([("mon", ["a"])]);
        let written = NodeRoleAssignment::invert(&resolved)
            .write(&locked.join("minions"))
            .unwrap();
        assert!(!written);
    }
}
