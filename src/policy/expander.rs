//! Policy Expander
//!
//! Drives the whole pillar generation run: load the policy, resolve its
//! targets, invert to per-minion roles, write the minion files and the
//! cluster-global file.

use crate::config::PolicySettings;
use crate::domain::ports::ExecutionContext;
use crate::error::Result;
use crate::policy::global::ClusterGlobalConfig;
use crate::policy::loader::RolePolicy;
use crate::policy::resolver::ResolvedPolicy;
use crate::policy::roles::NodeRoleAssignment;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Summary of a pillar generation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    /// Roles in the policy
    pub roles: usize,
    /// Minions that received a role file
    pub minions: usize,
    /// Whether the minion directory could be prepared and written
    pub minion_files_written: bool,
    /// Whether a new global file was created
    pub global_written: bool,
}

/// Expands the role policy into Salt pillar files
pub struct PolicyExpander {
    settings: PolicySettings,
}

impl PolicyExpander {
    pub fn new(settings: PolicySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    /// Run the full expansion
    pub fn deploy(&self, ctx: &dyn ExecutionContext) -> Result<DeployReport> {
        let policy = RolePolicy::load(&self.settings.policy_file)?;
        let resolved = ResolvedPolicy::resolve(&policy, ctx)?;
        let assignment = NodeRoleAssignment::invert(&resolved);

        let minion_files_written = assignment.write(&self.settings.minions_dir)?;
        if !minion_files_written {
            warn!(
                "Minion pillar not written to {}",
                self.settings.minions_dir.display()
            );
        }

        let global = ClusterGlobalConfig::generate(ctx)?;
        let global_written = global.write(&self.settings.global_file)?;

        let report = DeployReport {
            roles: policy.len(),
            minions: assignment.len(),
            minion_files_written,
            global_written,
        };
        info!(
            "Policy expanded: {} roles, {} minions",
            report.roles, report.minions
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticContext;
    use crate::error::Error;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn settings(tmp: &TempDir) -> PolicySettings {
        PolicySettings {
            policy_file: tmp.path().join("proposals/policy1.cfg"),
            minions_dir: tmp.path().join("minions"),
            global_file: tmp.path().join("global.yml"),
        }
    }

    #[test]
    fn test_deploy_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let settings = settings(&tmp);
        fs::create_dir_all(settings.policy_file.parent().unwrap()).unwrap();
        fs::write(
            &settings.policy_file,
            "role-mon: 'G@role:storage'\nrole-osd: 'G@role:storage'\nrole-master: 'G@master:True'\n",
        )
        .unwrap();

        let ctx = StaticContext::new()
            .with_target("G@role:storage", &["b", "a"])
            .with_target("G@master:True", &["admin"])
            .with_master_minion("admin");

        let report = PolicyExpander::new(settings.clone()).deploy(&ctx).unwrap();
        assert_eq!(report.roles, 3);
        assert_eq!(report.minions, 3);
        assert!(report.minion_files_written);
        assert!(report.global_written);

        let a = fs::read_to_string(settings.minions_dir.join("a.sls")).unwrap();
        assert_eq!(a, "roles:\n- mon\n- osd\n");
        let admin = fs::read_to_string(settings.minions_dir.join("admin.sls")).unwrap();
        assert_eq!(admin, "roles:\n- master\n");

        let fsid = ClusterGlobalConfig::load(&settings.global_file).unwrap().fsid;
        let again = PolicyExpander::new(settings.clone()).deploy(&ctx).unwrap();
        assert!(!again.global_written);
        assert_eq!(ClusterGlobalConfig::load(&settings.global_file).unwrap().fsid, fsid);
    }

    #[test]
    fn test_deploy_missing_policy() {
        let tmp = TempDir::new().unwrap();
        let err = PolicyExpander::new(settings(&tmp))
            .deploy(&StaticContext::new())
            .unwrap_err();
        assert_matches!(err, Error::PolicyMissing { .. });
    }
}
