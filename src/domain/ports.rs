//! Domain Ports - Core trait definitions for the deployment glue
//!
//! These traits define the boundaries between the deployment logic and the
//! systems it drives: the Salt execution environment and the local process
//! table. Adapters implement these traits to provide concrete functionality.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a managed host (a Salt minion id)
pub type NodeId = String;

/// Ceph daemon types managed as supervised containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonKind {
    Mon,
    Mgr,
}

impl DaemonKind {
    /// Human readable name used in unit descriptions
    pub fn description(&self) -> &'static str {
        match self {
            DaemonKind::Mon => "Ceph Monitor",
            DaemonKind::Mgr => "Ceph Manager",
        }
    }

    /// Daemon binary inside the Ceph image
    pub fn binary(&self) -> &'static str {
        match self {
            DaemonKind::Mon => "ceph-mon",
            DaemonKind::Mgr => "ceph-mgr",
        }
    }
}

impl std::fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonKind::Mon => write!(f, "mon"),
            DaemonKind::Mgr => write!(f, "mgr"),
        }
    }
}

// =============================================================================
// Execution Context Port
// =============================================================================

/// Capabilities supplied by the host automation environment.
///
/// Constructed once per invocation and passed to every component instead of
/// being looked up as ambient globals.
pub trait ExecutionContext: Send + Sync {
    /// Look up a grain of the local node; `None` when unset
    fn grain(&self, key: &str) -> Result<Option<String>>;

    /// Look up a pillar value for the local node; `None` when unset
    fn pillar(&self, key: &str) -> Result<Option<String>>;

    /// Resolve a compound target expression to the set of matching node ids.
    ///
    /// Returns an empty set when nothing matches.
    fn resolve_target(&self, expression: &str) -> Result<BTreeSet<NodeId>>;

    /// Identity of the Salt master's own minion (used as time server)
    fn master_minion(&self) -> Result<String>;

    /// Public address of the local node
    fn public_address(&self) -> Result<String>;

    /// Local host name, empty when the grain is missing
    fn hostname(&self) -> Result<String> {
        Ok(self.grain("host")?.unwrap_or_default())
    }

    /// Pillar value or empty string
    fn pillar_or_empty(&self, key: &str) -> Result<String> {
        Ok(self.pillar(key)?.unwrap_or_default())
    }
}

// =============================================================================
// Command Runner Port
// =============================================================================

/// Captured result of a finished external program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; -1 when the program was killed by a signal
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Blocking executor for external programs.
///
/// Every call waits for the child to exit; no timeout is enforced here.
pub trait CommandRunner: Send + Sync {
    /// Locate an executable by name in the search path
    fn find_program(&self, name: &str) -> Result<PathBuf>;

    /// Run a program to completion, capturing its status and both output
    /// streams whatever the exit status.
    fn output(&self, program: &Path, args: &[String]) -> Result<CommandOutput>;

    /// Run a program to completion; a non-zero exit status is an error
    fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let output = self.output(program, args)?;
        if !output.success() {
            let command = render_command(program, args);
            warn!("Command '{}' exited with status {}", command, output.status);
            return Err(Error::CommandFailed {
                command,
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Locate `name` and run it
    fn run_named(&self, name: &str, args: &[String]) -> Result<CommandOutput> {
        let program = self.find_program(name)?;
        self.run(&program, args)
    }

    /// Locate `name` and run it, tolerating a non-zero exit status
    fn output_named(&self, name: &str, args: &[String]) -> Result<CommandOutput> {
        let program = self.find_program(name)?;
        self.output(&program, args)
    }
}

/// Join a program and its arguments into a single display line
pub fn render_command(program: &Path, args: &[String]) -> String {
    std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}
