//! systemd Control
//!
//! Thin wrapper over `systemctl` for the unit operations the orchestrator
//! sequences. Every call blocks until `systemctl` exits.

use crate::domain::ports::{CommandOutput, CommandRunner};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// `systemctl` verbs used by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    Disable,
    Enable,
    Start,
    Stop,
}

impl std::fmt::Display for UnitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitAction::Disable => write!(f, "disable"),
            UnitAction::Enable => write!(f, "enable"),
            UnitAction::Start => write!(f, "start"),
            UnitAction::Stop => write!(f, "stop"),
        }
    }
}

/// Service manager client
#[derive(Clone)]
pub struct Systemd {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Systemd {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Apply `action` to `unit`
    pub fn unit(&self, action: UnitAction, unit: &str) -> Result<CommandOutput> {
        info!("systemctl {} {}", action, unit);
        self.runner
            .run_named(&self.program, &[action.to_string(), unit.to_string()])
    }

    pub fn daemon_reload(&self) -> Result<CommandOutput> {
        info!("systemctl daemon-reload");
        self.runner
            .run_named(&self.program, &["daemon-reload".to_string()])
    }
}

impl std::fmt::Debug for Systemd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Systemd")
            .field("program", &self.program)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;

    #[test]
    fn test_unit_commands() {
        let runner = Arc::new(RecordingRunner::new());
        let systemd = Systemd::new(runner.clone(), "systemctl");

        systemd.unit(UnitAction::Stop, "ceph-mon@a.service").unwrap();
        systemd.daemon_reload().unwrap();

        assert_eq!(
            runner.lines(),
            vec![
                "/usr/bin/systemctl stop ceph-mon@a.service",
                "/usr/bin/systemctl daemon-reload",
            ]
        );
    }
}
