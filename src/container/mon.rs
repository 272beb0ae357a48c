//! Monitor Lifecycle
//!
//! Creating a monitor either bootstraps a brand new cluster or joins an
//! existing one. Both paths end by initializing the monitor data directory,
//! after which the daemon can be installed as a systemd unit.

use crate::container::invocation::{ContainerInvocation, UserIds};
use crate::container::orchestrator::{
    makedirs, remove_dir, remove_file, require, CephOrchestrator, CEPH_ETC_DIR, CEPH_LIB_DIR,
    CEPH_LOG_DIR, CEPH_RUN_DIR, CONTAINER_TMP_DIR, LOCALTIME,
};
use crate::container::report::OrchestrationReport;
use crate::container::systemd::UnitAction;
use crate::container::unit::{container_template, instance_name, template_file_name};
use crate::domain::ports::{DaemonKind, ExecutionContext};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// How the monitor obtains its keyring and monmap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonBootstrap {
    /// First monitor of a new cluster: generate keyrings and a monmap
    BootstrapNew { fsid: String },
    /// Additional monitor: pull monmap and keyring from the cluster
    JoinExisting,
}

impl MonBootstrap {
    /// Bootstrap with `fsid`, falling back to the pillar or a fresh one
    pub fn bootstrap_new(ctx: &dyn ExecutionContext, fsid: Option<String>) -> Result<Self> {
        let fsid = match fsid {
            Some(fsid) => fsid,
            None => make_or_get_fsid(ctx)?,
        };
        Ok(MonBootstrap::BootstrapNew { fsid })
    }
}

/// Parameters of [`CephOrchestrator::create_mon`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonCreate {
    pub bootstrap: MonBootstrap,
    pub user: UserIds,
    /// Install and start the systemd unit afterwards
    pub start: bool,
}

/// The pillar `fsid`, or a freshly generated one
pub fn make_or_get_fsid(ctx: &dyn ExecutionContext) -> Result<String> {
    Ok(ctx
        .pillar("fsid")?
        .unwrap_or_else(|| Uuid::new_v4().to_string()))
}

impl CephOrchestrator {
    /// Host data directory of the local monitor
    fn mon_data_dir(&self) -> std::path::PathBuf {
        self.layout
            .lib_dir
            .join("mon")
            .join(format!("ceph-{}", self.node_name))
    }

    /// Prepare a monitor and optionally start it
    pub fn create_mon(&self, image: &str, plan: &MonCreate) -> Result<OrchestrationReport> {
        let mut report = OrchestrationReport::new();
        let mon_name = self.node_name.clone();
        makedirs(&self.layout.lib_dir)?;

        let (monmap, keyring) = match &plan.bootstrap {
            MonBootstrap::BootstrapNew { fsid } => {
                warn!("Bootstrapping new cluster {} on {}", fsid, mon_name);
                let keyring = self.create_initial_keyring(image, &mut report)?;
                self.generate_osd_bootstrap_keyring(image, &mut report)?;
                self.add_generated_keys(image, &mut report)?;
                let monmap = self.make_monmap(image, fsid, &mut report)?;
                (monmap, keyring)
            }
            MonBootstrap::JoinExisting => {
                warn!("Joining {} to the existing cluster", mon_name);
                let monmap = self.extract_mon_map(image, &mut report)?;
                let keyring = self.extract_keyring(image, &mut report)?;
                (monmap, keyring)
            }
        };

        makedirs(&self.mon_data_dir())?;
        makedirs(&self.layout.log_dir)?;

        let cluster_network = self.ctx.pillar_or_empty("cluster_network")?;
        let public_network = self.ctx.pillar_or_empty("public_network")?;
        require("cluster_network", &cluster_network)?;
        require("public_network", &public_network)?;
        require("monmap", &monmap)?;
        require("mon keyring", &keyring)?;
        require("mon name", &mon_name)?;

        let mkfs = ContainerInvocation::new(image, DaemonKind::Mon.binary())
            .args([
                "--mkfs",
                "-i",
                mon_name.as_str(),
                "--keyring",
                keyring.as_str(),
                "--monmap",
                monmap.as_str(),
            ])
            .args(plan.user.args())
            .mount(&self.layout.lib_dir, CEPH_LIB_DIR)
            .mount(&self.layout.tmp_dir, CONTAINER_TMP_DIR)
            .mount(&self.layout.etc_dir, CEPH_ETC_DIR);
        self.run_step(&mut report, "mon-mkfs", &mon_name, &mkfs)?;

        if plan.start {
            report.extend(self.start_mon(image, &mon_name, plan.user)?);
        }
        Ok(report)
    }

    /// Install and start the `ceph-mon@<name>` unit
    pub fn start_mon(
        &self,
        image: &str,
        mon_name: &str,
        user: UserIds,
    ) -> Result<OrchestrationReport> {
        makedirs(&self.layout.run_dir)?;

        let container = ContainerInvocation::new(image, DaemonKind::Mon.binary())
            .args(["-i", mon_name, "-f", "-d"])
            .args(user.args())
            .mount_with(&self.layout.lib_dir, CEPH_LIB_DIR, "z")
            .mount_with(&self.layout.run_dir, CEPH_RUN_DIR, "z")
            .mount_with(&self.layout.localtime, LOCALTIME, "ro")
            .mount_with(&self.layout.log_dir, CEPH_LOG_DIR, "z")
            .name(container_template(DaemonKind::Mon));

        self.install_and_start(DaemonKind::Mon, mon_name, &container)
    }

    /// Remove the local monitor from the cluster and the node
    pub fn remove_mon(&self, image: &str) -> Result<OrchestrationReport> {
        let mon_name = self.node_name.clone();
        require("mon name", &mon_name)?;
        let mut report = OrchestrationReport::new();

        let remove = ContainerInvocation::new(image, "ceph")
            .args(["mon", "remove", mon_name.as_str()])
            .mounts(self.daemon_mounts("ro"))
            .name("ceph-mon-removed");
        self.run_step(&mut report, "mon-remove", &mon_name, &remove)?;

        let unit = instance_name(DaemonKind::Mon, &mon_name);
        self.unit_step(&mut report, UnitAction::Stop, &unit)?;
        self.unit_step(&mut report, UnitAction::Disable, &unit)?;

        let data_dir = self.mon_data_dir();
        remove_dir(&data_dir)?;
        report.record("remove-data-dir", data_dir.display().to_string());

        let unit_file = self.layout.unit_dir.join(template_file_name(DaemonKind::Mon));
        remove_file(&unit_file)?;
        report.record("remove-unit-file", unit_file.display().to_string());

        self.daemon_reload(&mut report)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::orchestrator::test_support::*;
    use crate::error::Error;
    use crate::process::RecordingRunner;
    use assert_matches::assert_matches;
    use std::fs;

    const FSID: &str = "8d2e6c1a-5b4f-4c3e-9a7d-1f0e2b3c4d5e";

    fn plan(bootstrap: MonBootstrap, start: bool) -> MonCreate {
        MonCreate {
            bootstrap,
            user: UserIds::default(),
            start,
        }
    }

    #[test]
    fn test_bootstrap_never_extracts() {
        let (orch, runner, tmp) = orchestrator(context(), RecordingRunner::new());
        let bootstrap = MonBootstrap::BootstrapNew { fsid: FSID.into() };

        let report = orch.create_mon(IMAGE, &plan(bootstrap, false)).unwrap();

        assert!(runner.called("--create-keyring"));
        assert!(runner.called("monmaptool"));
        assert!(!runner.called("mon getmap"));
        assert!(!runner.called("get-or-create mon."));

        let last = runner.calls().last().unwrap().clone();
        assert!(last.contains(
            "--mkfs -i node1 --keyring /var/lib/ceph/tmp/bootstrap_keyring --monmap /tmp/bootstrap_monmap"
        ));
        assert_eq!(report.last().unwrap().step, "mon-mkfs");
        assert!(tmp.path().join("var/lib/ceph/mon/ceph-node1").is_dir());
    }

    #[test]
    fn test_join_never_generates() {
        let (orch, runner, _tmp) = orchestrator(context(), RecordingRunner::new());

        let report = orch
            .create_mon(IMAGE, &plan(MonBootstrap::JoinExisting, false))
            .unwrap();

        assert!(!runner.called("--create-keyring"));
        assert!(!runner.called("monmaptool"));
        assert_eq!(
            report.step_names(),
            vec!["monmap-extract", "mon-keyring-extract", "mon-mkfs"]
        );
        assert!(runner.calls().last().unwrap().contains(
            "--keyring /var/lib/ceph/tmp/mon.keyring --monmap /var/lib/ceph/tmp/mon_map"
        ));
    }

    #[test]
    fn test_missing_network_is_precondition_failure() {
        let mut ctx = context();
        ctx.pillar.remove("cluster_network");
        let (orch, runner, _tmp) = orchestrator(ctx, RecordingRunner::new());

        let err = orch
            .create_mon(IMAGE, &plan(MonBootstrap::JoinExisting, false))
            .unwrap_err();
        assert_matches!(err, Error::Precondition(msg) if msg.contains("cluster_network"));
        assert!(!runner.called("--mkfs"));
    }

    #[test]
    fn test_create_and_start_mon() {
        let (orch, runner, tmp) = orchestrator(context(), RecordingRunner::new());
        let mut plan = plan(MonBootstrap::JoinExisting, true);
        plan.user = UserIds::new(167, 167);

        let report = orch.create_mon(IMAGE, &plan).unwrap();

        let lines = runner.lines();
        let tail: Vec<_> = lines[lines.len() - 3..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "/usr/bin/systemctl disable ceph-mon@node1.service",
                "/usr/bin/systemctl enable ceph-mon@node1.service",
                "/usr/bin/systemctl start ceph-mon@node1.service",
            ]
        );
        assert!(report.contains("install-unit"));

        let unit_path = tmp.path().join("usr/lib/systemd/system/ceph-mon@.service");
        let unit = fs::read_to_string(unit_path).unwrap();
        assert!(unit.contains("Description=Ceph Monitor"));
        assert!(unit.contains("--name ceph-mon-%i"));
        assert!(unit.contains("-i node1 -f -d --setuser 167 --setgroup 167"));
    }

    #[test]
    fn test_start_aborts_on_failed_enable() {
        let runner = RecordingRunner::new().fail_on("enable ceph-mon", 1);
        let (orch, runner, _tmp) = orchestrator(context(), runner);

        let err = orch.start_mon(IMAGE, "node1", UserIds::default()).unwrap_err();
        assert_matches!(err, Error::CommandFailed { .. });
        assert!(!runner.called("start ceph-mon@node1.service"));
    }

    #[test]
    fn test_remove_mon() {
        let (orch, runner, tmp) = orchestrator(context(), RecordingRunner::new());
        let data_dir = tmp.path().join("var/lib/ceph/mon/ceph-node1");
        let unit_file = tmp.path().join("usr/lib/systemd/system/ceph-mon@.service");
        fs::create_dir_all(&data_dir).unwrap();
        fs::create_dir_all(unit_file.parent().unwrap()).unwrap();
        fs::write(&unit_file, "[Unit]\n").unwrap();

        let report = orch.remove_mon(IMAGE).unwrap();

        let lines = runner.lines();
        assert!(lines[0].contains("--name ceph-mon-removed"));
        assert!(lines[0].ends_with("mon remove node1"));
        assert!(lines[0].contains(":/etc/ceph:ro"));
        assert_eq!(lines[1], "/usr/bin/systemctl stop ceph-mon@node1.service");
        assert_eq!(lines[2], "/usr/bin/systemctl disable ceph-mon@node1.service");
        assert_eq!(lines[3], "/usr/bin/systemctl daemon-reload");
        assert!(!data_dir.exists());
        assert!(!unit_file.exists());
        assert_eq!(report.last().unwrap().step, "systemctl-daemon-reload");
    }

    #[test]
    fn test_make_or_get_fsid() {
        let ctx = context().with_pillar("fsid", FSID);
        assert_eq!(make_or_get_fsid(&ctx).unwrap(), FSID);

        let generated = make_or_get_fsid(&context()).unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());

        let bootstrap = MonBootstrap::bootstrap_new(&ctx, None).unwrap();
        assert_eq!(bootstrap, MonBootstrap::BootstrapNew { fsid: FSID.into() });
    }
}
