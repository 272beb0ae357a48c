//! Manager Lifecycle

use crate::container::invocation::ContainerInvocation;
use crate::container::orchestrator::{
    makedirs, remove_dir, remove_file, require, CephOrchestrator, CEPH_ETC_DIR, CEPH_LIB_DIR,
    CEPH_LOG_DIR, CEPH_RUN_DIR, LOCALTIME,
};
use crate::container::report::OrchestrationReport;
use crate::container::systemd::UnitAction;
use crate::container::unit::{container_template, instance_name, template_file_name};
use crate::domain::ports::DaemonKind;
use crate::error::Result;

impl CephOrchestrator {
    /// Create the local manager; the daemon bootstraps itself on start
    pub fn create_mgr(&self, image: &str) -> Result<OrchestrationReport> {
        self.start_mgr(image)
    }

    /// Install and start the `ceph-mgr@<host>` unit
    pub fn start_mgr(&self, image: &str) -> Result<OrchestrationReport> {
        let mgr_name = self.node_name.clone();
        makedirs(&self.layout.log_dir)?;
        makedirs(&self.layout.run_dir)?;

        let container = ContainerInvocation::new(image, DaemonKind::Mgr.binary())
            .args(["-i", mgr_name.as_str(), "-f", "-d"])
            .mount_with(&self.layout.lib_dir, CEPH_LIB_DIR, "z")
            .mount_with(&self.layout.run_dir, CEPH_RUN_DIR, "z")
            .mount(&self.layout.etc_dir, CEPH_ETC_DIR)
            .mount_with(&self.layout.localtime, LOCALTIME, "ro")
            .mount_with(&self.layout.log_dir, CEPH_LOG_DIR, "z")
            .name(container_template(DaemonKind::Mgr));

        self.install_and_start(DaemonKind::Mgr, &mgr_name, &container)
    }

    /// Stop the local manager and remove its state and unit
    pub fn remove_mgr(&self) -> Result<OrchestrationReport> {
        let mgr_name = self.node_name.clone();
        require("mgr name", &mgr_name)?;
        let mut report = OrchestrationReport::new();

        let unit = instance_name(DaemonKind::Mgr, &mgr_name);
        self.unit_step(&mut report, UnitAction::Stop, &unit)?;
        self.unit_step(&mut report, UnitAction::Disable, &unit)?;

        let data_dir = self
            .layout
            .lib_dir
            .join("mgr")
            .join(format!("ceph-{}", mgr_name));
        remove_dir(&data_dir)?;
        report.record("remove-data-dir", data_dir.display().to_string());

        let unit_file = self.layout.unit_dir.join(template_file_name(DaemonKind::Mgr));
        remove_file(&unit_file)?;
        report.record("remove-unit-file", unit_file.display().to_string());

        self.daemon_reload(&mut report)?;
        Ok(report)
    }
}
