//! Daemon Unit Files
//!
//! Renders the systemd template unit that supervises a containerized Ceph
//! daemon. The start command is the exact container command line.

use crate::domain::ports::DaemonKind;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Generated systemd template unit for one daemon type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonUnit {
    pub kind: DaemonKind,
    pub description: String,
    /// Runtime binary used for the cleanup commands
    pub runtime: String,
    pub exec_start: String,
    pub restart: String,
    pub restart_sec: u64,
    pub timeout_start_sec: u64,
    pub timeout_stop_sec: u64,
}

impl DaemonUnit {
    pub fn new(kind: DaemonKind, runtime: impl Into<String>, command_line: &[String]) -> Self {
        Self {
            kind,
            description: kind.description().to_string(),
            runtime: runtime.into(),
            exec_start: command_line.join(" "),
            restart: "always".to_string(),
            restart_sec: 10,
            timeout_start_sec: 120,
            timeout_stop_sec: 15,
        }
    }

    /// Template unit file name, e.g. `ceph-mon@.service`
    pub fn file_name(&self) -> String {
        template_file_name(self.kind)
    }

    /// Container name with the instance specifier
    pub fn container_name(&self) -> String {
        container_template(self.kind)
    }

    pub fn render(&self) -> String {
        let container = self.container_name();
        format!(
            "[Unit]\n\
             Description={description}\n\
             After=network.target\n\
             [Service]\n\
             EnvironmentFile=-/etc/environment\n\
             ExecStartPre=-{runtime} rm {container}\n\
             ExecStart={exec_start}\n\
             ExecStop=-{runtime} stop {container}\n\
             ExecStopPost=-/bin/rm -f /var/run/ceph/ceph-{kind}.%i.asok\n\
             Restart={restart}\n\
             RestartSec={restart_sec}s\n\
             TimeoutStartSec={timeout_start}\n\
             TimeoutStopSec={timeout_stop}\n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            description = self.description,
            runtime = self.runtime,
            container = container,
            exec_start = self.exec_start,
            kind = self.kind,
            restart = self.restart,
            restart_sec = self.restart_sec,
            timeout_start = self.timeout_start_sec,
            timeout_stop = self.timeout_stop_sec,
        )
    }

    /// Write the unit into `unit_dir`, returning its path
    pub fn install(&self, unit_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(unit_dir)?;
        let path = unit_dir.join(self.file_name());
        fs::write(&path, self.render())?;
        info!("Installed {}", path.display());
        Ok(path)
    }
}

/// `ceph-<kind>@.service`
pub fn template_file_name(kind: DaemonKind) -> String {
    format!("ceph-{}@.service", kind)
}

/// `ceph-<kind>@<instance>.service`
pub fn instance_name(kind: DaemonKind, instance: &str) -> String {
    format!("ceph-{}@{}.service", kind, instance)
}

/// `ceph-<kind>-%i`
pub fn container_template(kind: DaemonKind) -> String {
    format!("ceph-{}-%i", kind)
}
