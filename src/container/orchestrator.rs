//! Ceph Container Orchestrator
//!
//! Owns the collaborators every daemon sequence needs (execution context,
//! container runtime, systemd) and the shared helpers for running steps.
//! The sequences themselves live in [`keyring`](super::keyring),
//! [`mon`](super::mon) and [`mgr`](super::mgr).

use crate::config::{CephLayout, ContainerSettings};
use crate::container::invocation::{ContainerInvocation, ContainerRuntime, VolumeMount};
use crate::container::report::OrchestrationReport;
use crate::container::systemd::{Systemd, UnitAction};
use crate::container::unit::{instance_name, DaemonUnit};
use crate::domain::ports::{CommandRunner, DaemonKind, ExecutionContext};
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

// =============================================================================
// Container-side Paths
// =============================================================================

pub const CEPH_LIB_DIR: &str = "/var/lib/ceph";
pub const CEPH_ETC_DIR: &str = "/etc/ceph";
pub const CEPH_RUN_DIR: &str = "/var/run/ceph";
pub const CEPH_LOG_DIR: &str = "/var/log/ceph";
pub const CONTAINER_TMP_DIR: &str = "/tmp";
pub const LOCALTIME: &str = "/etc/localtime";
pub const ADMIN_KEYRING: &str = "/etc/ceph/ceph.client.admin.keyring";

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives containerized Ceph daemons on the local node
pub struct CephOrchestrator {
    pub(crate) ctx: Arc<dyn ExecutionContext>,
    pub(crate) runtime: ContainerRuntime,
    pub(crate) systemd: Systemd,
    pub(crate) layout: CephLayout,
    pub(crate) node_name: String,
}

impl CephOrchestrator {
    /// Create an orchestrator for the local node.
    ///
    /// The node name comes from the `host` grain.
    pub fn new(
        ctx: Arc<dyn ExecutionContext>,
        runner: Arc<dyn CommandRunner>,
        settings: &ContainerSettings,
        layout: CephLayout,
    ) -> Result<Self> {
        let node_name = ctx.hostname()?;
        debug!("Orchestrating node '{}'", node_name);

        Ok(Self {
            runtime: ContainerRuntime::new(runner.clone(), &settings.runtime, &node_name),
            systemd: Systemd::new(runner, &settings.systemctl),
            ctx,
            layout,
            node_name,
        })
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn layout(&self) -> &CephLayout {
        &self.layout
    }

    pub fn runtime(&self) -> &ContainerRuntime {
        &self.runtime
    }

    // =========================================================================
    // Ad-hoc Ceph Commands
    // =========================================================================

    /// Run `ceph --version` in the image
    pub fn ceph_version(&self, image: &str) -> Result<String> {
        let invocation = ContainerInvocation::new(image, "ceph").arg("--version");
        self.runtime.run(&invocation)
    }

    /// Run `ceph <args>` against the cluster and return its output
    pub fn ceph_cli(&self, image: &str, args: &[String]) -> Result<String> {
        let invocation = ContainerInvocation::new(image, "ceph")
            .args(args.iter().cloned())
            .mounts(self.daemon_mounts("z"));

        self.runtime.run(&invocation).map_err(|e| {
            error!("ceph {} failed: {}", args.join(" "), e);
            e
        })
    }

    // =========================================================================
    // Step Helpers
    // =========================================================================

    /// Run a container and record the step on success
    pub(crate) fn run_step(
        &self,
        report: &mut OrchestrationReport,
        step: &str,
        detail: &str,
        invocation: &ContainerInvocation,
    ) -> Result<String> {
        let out = self.runtime.run(invocation)?;
        report.record(step, detail);
        Ok(out)
    }

    /// Apply a systemctl action and record the step on success
    pub(crate) fn unit_step(
        &self,
        report: &mut OrchestrationReport,
        action: UnitAction,
        unit: &str,
    ) -> Result<()> {
        self.systemd.unit(action, unit)?;
        report.record(&format!("systemctl-{}", action), unit);
        Ok(())
    }

    pub(crate) fn daemon_reload(&self, report: &mut OrchestrationReport) -> Result<()> {
        self.systemd.daemon_reload()?;
        report.record("systemctl-daemon-reload", "");
        Ok(())
    }

    /// Write the daemon's unit file, then disable, enable and start it
    pub(crate) fn install_and_start(
        &self,
        kind: DaemonKind,
        instance: &str,
        container: &ContainerInvocation,
    ) -> Result<OrchestrationReport> {
        let mut report = OrchestrationReport::new();
        let command_line = self.runtime.command_line(container)?;
        let runtime = self.runtime.program_path()?;
        info!("{}", command_line.join(" "));

        let unit = DaemonUnit::new(kind, runtime.display().to_string(), &command_line);
        let path = unit.install(&self.layout.unit_dir)?;
        report.record("install-unit", path.display().to_string());

        let name = instance_name(kind, instance);
        self.unit_step(&mut report, UnitAction::Disable, &name)?;
        self.unit_step(&mut report, UnitAction::Enable, &name)?;
        self.unit_step(&mut report, UnitAction::Start, &name)?;

        info!("See > journalctl -f -u {}", name);
        Ok(report)
    }

    /// Mounts for long-running daemons and admin commands.
    ///
    /// `etc_options` is applied to the `/etc/ceph` mount; empty means none.
    pub(crate) fn daemon_mounts(&self, etc_options: &str) -> Vec<VolumeMount> {
        let etc = VolumeMount::new(&self.layout.etc_dir, CEPH_ETC_DIR);
        let etc = if etc_options.is_empty() {
            etc
        } else {
            etc.with_options(etc_options)
        };

        vec![
            VolumeMount::new(&self.layout.lib_dir, CEPH_LIB_DIR).with_options("z"),
            VolumeMount::new(&self.layout.run_dir, CEPH_RUN_DIR).with_options("z"),
            etc,
            VolumeMount::new(&self.layout.localtime, LOCALTIME).with_options("ro"),
            VolumeMount::new(&self.layout.log_dir, CEPH_LOG_DIR).with_options("z"),
        ]
    }

    /// Mounts for keyring and monmap tooling
    pub(crate) fn tool_mounts(&self) -> Vec<VolumeMount> {
        vec![
            VolumeMount::new(&self.layout.tmp_dir, CONTAINER_TMP_DIR),
            VolumeMount::new(&self.layout.lib_dir, CEPH_LIB_DIR),
            VolumeMount::new(&self.layout.etc_dir, CEPH_ETC_DIR),
        ]
    }
}

impl std::fmt::Debug for CephOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CephOrchestrator")
            .field("runtime", &self.runtime)
            .field("systemd", &self.systemd)
            .field("layout", &self.layout)
            .field("node_name", &self.node_name)
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn makedirs(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

pub(crate) fn remove_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

pub(crate) fn remove_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Fail with a precondition error when `value` is empty
pub(crate) fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Precondition(format!("{} is empty", what)));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::process::RecordingRunner;
    use assert_matches::assert_matches;

    #[test]
    fn test_ceph_cli_mounts_and_args() {
        let (orch, runner, tmp) =
            orchestrator(context(), RecordingRunner::new().respond("health", "HEALTH_OK\n"));

        let out = orch
            .ceph_cli(IMAGE, &["health".to_string(), "detail".to_string()])
            .unwrap();
        assert_eq!(out, "HEALTH_OK\n");

        let line = &runner.lines()[0];
        let lib = tmp.path().join("var/lib/ceph");
        assert!(line.contains(&format!("-v {}:/var/lib/ceph:z", lib.display())));
        assert!(line.contains("-v /etc/localtime:/etc/localtime:ro"));
        assert!(line.ends_with(
            "--entrypoint /usr/bin/ceph registry.example.com/ceph/daemon:v15 health detail"
        ));
    }

    #[test]
    fn test_ceph_cli_failure_propagates() {
        let (orch, _runner, _tmp) =
            orchestrator(context(), RecordingRunner::new().fail_on("osd tree", 1));

        let err = orch
            .ceph_cli(IMAGE, &["osd".to_string(), "tree".to_string()])
            .unwrap_err();
        assert_matches!(err, Error::CommandFailed { status: 1, .. });
    }

    #[test]
    fn test_dry_run_queries_salt_and_stages_files() {
        use crate::config::{SaltSettings, Settings};
        use crate::context::SaltContext;
        use tempfile::TempDir;

        let salt = Arc::new(
            RecordingRunner::new().respond("grains.get host", "{\"local\": \"node1\"}"),
        );
        let dry =
            Arc::new(RecordingRunner::dry_run().delegate(salt.clone(), ["salt-call", "salt"]));
        let runner: Arc<dyn CommandRunner> = dry.clone();
        let ctx = Arc::new(SaltContext::new(runner.clone(), SaltSettings::default()));

        let tmp = TempDir::new().unwrap();
        let settings = Settings::default().staged(tmp.path());
        let orch =
            CephOrchestrator::new(ctx, runner, &settings.container, settings.layout).unwrap();
        assert_eq!(orch.node_name(), "node1");

        let data_dir = tmp.path().join("var/lib/ceph/mgr/ceph-node1");
        fs::create_dir_all(&data_dir).unwrap();
        orch.remove_mgr().unwrap();

        assert!(!data_dir.exists());
        assert_eq!(salt.lines(), vec!["/usr/bin/salt-call --out=json grains.get host"]);
        assert!(dry.lines().iter().all(|line| line.starts_with("/usr/bin/systemctl")));
    }

    #[test]
    fn test_require() {
        assert!(require("public_network", "10.0.0.0/24").is_ok());
        assert_matches!(require("public_network", ""), Err(Error::Precondition(_)));
    }
}
