//! Keyring and Monmap Steps
//!
//! Generation (new cluster) and extraction (existing cluster) of the
//! monitor keyring and monitor map, plus the manager keyring.

use crate::container::invocation::ContainerInvocation;
use crate::container::orchestrator::{
    makedirs, require, CephOrchestrator, ADMIN_KEYRING, CEPH_ETC_DIR, CEPH_LIB_DIR,
    CONTAINER_TMP_DIR,
};
use crate::container::report::OrchestrationReport;
use crate::error::Result;
use tracing::info;

pub const MON_BOOTSTRAP_KEYRING: &str = "/var/lib/ceph/tmp/bootstrap_keyring";
pub const OSD_BOOTSTRAP_KEYRING: &str = "/var/lib/ceph/bootstrap-osd/ceph.keyring";
pub const BOOTSTRAP_MONMAP: &str = "/tmp/bootstrap_monmap";
pub const EXTRACTED_MONMAP: &str = "/var/lib/ceph/tmp/mon_map";
pub const EXTRACTED_MON_KEYRING: &str = "/var/lib/ceph/tmp/mon.keyring";
pub const MGR_KEYRING_CACHE: &str = "/srv/salt/ceph/mgr/cache";

impl CephOrchestrator {
    /// Create the `mon.` keyring and the `client.admin` keyring.
    ///
    /// Returns the container path of the mon keyring.
    pub fn create_initial_keyring(
        &self,
        image: &str,
        report: &mut OrchestrationReport,
    ) -> Result<String> {
        makedirs(&self.layout.lib_dir.join("tmp"))?;

        let mon = ContainerInvocation::new(image, "ceph-authtool")
            .args([
                "--create-keyring",
                MON_BOOTSTRAP_KEYRING,
                "--gen-key",
                "-n",
                "mon.",
                "--cap",
                "mon",
                "allow *",
            ])
            .mount(self.layout.lib_dir.join("tmp"), "/var/lib/ceph/tmp");
        self.run_step(report, "mon-keyring", MON_BOOTSTRAP_KEYRING, &mon)?;

        let admin = ContainerInvocation::new(image, "ceph-authtool")
            .args([
                "--create-keyring",
                ADMIN_KEYRING,
                "--gen-key",
                "-n",
                "client.admin",
                "--cap",
                "mon",
                "allow *",
                "--cap",
                "osd",
                "allow *",
                "--cap",
                "mds",
                "allow *",
                "--cap",
                "mgr",
                "allow *",
            ])
            .mounts(self.tool_mounts());
        self.run_step(report, "admin-keyring", ADMIN_KEYRING, &admin)?;

        Ok(MON_BOOTSTRAP_KEYRING.to_string())
    }

    /// Create the `client.bootstrap-osd` keyring
    pub fn generate_osd_bootstrap_keyring(
        &self,
        image: &str,
        report: &mut OrchestrationReport,
    ) -> Result<String> {
        makedirs(&self.layout.lib_dir.join("bootstrap-osd"))?;

        let invocation = ContainerInvocation::new(image, "ceph-authtool")
            .args([
                "--create-keyring",
                OSD_BOOTSTRAP_KEYRING,
                "--gen-key",
                "-n",
                "client.bootstrap-osd",
                "--cap",
                "mon",
                "profile bootstrap-osd",
            ])
            .mounts(self.tool_mounts());
        self.run_step(report, "osd-bootstrap-keyring", OSD_BOOTSTRAP_KEYRING, &invocation)?;

        Ok(OSD_BOOTSTRAP_KEYRING.to_string())
    }

    /// Import the admin and bootstrap-osd keys into the mon keyring
    pub fn add_generated_keys(&self, image: &str, report: &mut OrchestrationReport) -> Result<()> {
        makedirs(&self.layout.lib_dir.join("bootstrap-osd"))?;

        for source in [ADMIN_KEYRING, OSD_BOOTSTRAP_KEYRING] {
            let invocation = ContainerInvocation::new(image, "ceph-authtool")
                .args([MON_BOOTSTRAP_KEYRING, "--import-keyring", source])
                .mounts(self.tool_mounts());
            self.run_step(report, "import-keyring", source, &invocation)?;
        }
        Ok(())
    }

    /// Create an initial monmap naming this node as the only monitor
    pub fn make_monmap(
        &self,
        image: &str,
        fsid: &str,
        report: &mut OrchestrationReport,
    ) -> Result<String> {
        let address = self.ctx.public_address()?;

        let invocation = ContainerInvocation::new(image, "monmaptool")
            .args([
                "--create",
                "--add",
                self.node_name.as_str(),
                address.as_str(),
                "--fsid",
                fsid,
                BOOTSTRAP_MONMAP,
                "--clobber",
            ])
            .mount(&self.layout.tmp_dir, CONTAINER_TMP_DIR);
        self.run_step(report, "monmap-create", BOOTSTRAP_MONMAP, &invocation)?;

        info!("Initial mon_map created here: {}", BOOTSTRAP_MONMAP);
        Ok(BOOTSTRAP_MONMAP.to_string())
    }

    /// Fetch the current monmap from the running cluster
    pub fn extract_mon_map(&self, image: &str, report: &mut OrchestrationReport) -> Result<String> {
        makedirs(&self.layout.lib_dir.join("tmp"))?;

        let invocation = ContainerInvocation::new(image, "ceph")
            .args(["mon", "getmap", "-o", EXTRACTED_MONMAP])
            .mount(self.layout.lib_dir.join("tmp"), "/var/lib/ceph/tmp")
            .mount(&self.layout.etc_dir, CEPH_ETC_DIR);
        self.run_step(report, "monmap-extract", EXTRACTED_MONMAP, &invocation)?;

        Ok(EXTRACTED_MONMAP.to_string())
    }

    /// Fetch the existing `mon.` keyring from the running cluster
    pub fn extract_keyring(&self, image: &str, report: &mut OrchestrationReport) -> Result<String> {
        makedirs(&self.layout.lib_dir.join("tmp"))?;

        let invocation = ContainerInvocation::new(image, "ceph")
            .args(["auth", "get-or-create", "mon.", "-o", EXTRACTED_MON_KEYRING])
            .mount(&self.layout.lib_dir, CEPH_LIB_DIR)
            .mount(&self.layout.etc_dir, CEPH_ETC_DIR);
        self.run_step(report, "mon-keyring-extract", EXTRACTED_MON_KEYRING, &invocation)?;

        info!("{} extracted", EXTRACTED_MON_KEYRING);
        Ok(EXTRACTED_MON_KEYRING.to_string())
    }

    /// Create (or fetch) the `mgr.<name>` keyring into the Salt file cache
    pub fn create_mgr_keyring(&self, image: &str, mgr_name: &str) -> Result<OrchestrationReport> {
        require("image", image)?;
        require("mgr name", mgr_name)?;
        makedirs(&self.layout.mgr_keyring_cache)?;

        let keyring = format!("{}/{}.keyring", MGR_KEYRING_CACHE, mgr_name);
        let entity = format!("mgr.{}", mgr_name);
        let invocation = ContainerInvocation::new(image, "ceph")
            .args([
                "auth",
                "get-or-create",
                entity.as_str(),
                "mon",
                "allow profile mgr",
                "osd",
                "allow *",
                "mds",
                "allow *",
                "-o",
                keyring.as_str(),
            ])
            .mount(&self.layout.lib_dir, CEPH_LIB_DIR)
            .mount(&self.layout.mgr_keyring_cache, MGR_KEYRING_CACHE)
            .mount(&self.layout.etc_dir, CEPH_ETC_DIR);

        let mut report = OrchestrationReport::new();
        self.run_step(&mut report, "mgr-keyring", &keyring, &invocation)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use crate::container::orchestrator::test_support::*;
    use crate::container::report::OrchestrationReport;
    use crate::error::Error;
    use crate::process::RecordingRunner;
    use assert_matches::assert_matches;

    #[test]
    fn test_initial_keyring_steps() {
        let (orch, runner, tmp) = orchestrator(context(), RecordingRunner::new());
        let mut report = OrchestrationReport::new();

        let keyring = orch.create_initial_keyring(IMAGE, &mut report).unwrap();
        assert_eq!(keyring, "/var/lib/ceph/tmp/bootstrap_keyring");
        assert!(tmp.path().join("var/lib/ceph/tmp").is_dir());

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        // Capabilities stay single arguments
        assert!(calls[0].args.iter().any(|a| a == "allow *"));
        assert!(calls[1].contains("-n client.admin"));
        assert_eq!(report.step_names(), vec!["mon-keyring", "admin-keyring"]);
    }

    #[test]
    fn test_make_monmap_uses_public_address() {
        let (orch, runner, _tmp) = orchestrator(context(), RecordingRunner::new());
        let mut report = OrchestrationReport::new();

        orch.make_monmap(IMAGE, "c6a1a1b0-0000-4000-8000-000000000001", &mut report)
            .unwrap();
        assert!(runner.lines()[0].contains(
            "--create --add node1 10.0.0.11 --fsid c6a1a1b0-0000-4000-8000-000000000001 /tmp/bootstrap_monmap --clobber"
        ));
    }

    #[test]
    fn test_mgr_keyring_requires_name() {
        let (orch, runner, _tmp) = orchestrator(context(), RecordingRunner::new());

        let err = orch.create_mgr_keyring(IMAGE, "").unwrap_err();
        assert_matches!(err, Error::Precondition(_));
        assert!(runner.calls().is_empty());

        orch.create_mgr_keyring(IMAGE, "node1").unwrap();
        let call = &runner.calls()[0];
        assert!(call.contains("get-or-create mgr.node1"));
        assert!(call.args.iter().any(|a| a == "allow profile mgr"));
        assert!(call.contains("-o /srv/salt/ceph/mgr/cache/node1.keyring"));
    }
}
