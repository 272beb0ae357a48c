//! Local Process Runner
//!
//! Runs external programs (podman, systemctl, salt-call) synchronously via
//! `std::process::Command`, capturing their output.

use crate::domain::ports::{CommandOutput, CommandRunner};
pub use crate::domain::ports::render_command;
use crate::error::{Error, Result};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

// =============================================================================
// System Runner
// =============================================================================

/// Runs programs on the local host
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// Search path override; falls back to `$PATH`
    search_path: Option<OsString>,
}

impl SystemRunner {
    /// Create a runner using the process `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner that searches the given path list instead of `PATH`
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    fn search_path(&self) -> Option<OsString> {
        self.search_path.clone().or_else(|| env::var_os("PATH"))
    }
}

impl CommandRunner for SystemRunner {
    fn find_program(&self, name: &str) -> Result<PathBuf> {
        let not_found = || Error::ProgramNotFound {
            program: name.to_string(),
        };

        // Explicit paths are taken as-is
        if name.contains('/') {
            let path = PathBuf::from(name);
            return if is_executable(&path) {
                Ok(path)
            } else {
                Err(not_found())
            };
        }

        let search_path = self.search_path().ok_or_else(not_found)?;
        env::split_paths(&search_path)
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(not_found)
    }

    fn output(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let command = render_command(program, args);
        debug!("Executing: {}", command);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::CommandSpawn { command, source })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_executable(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_missing_program() {
        let tmp = TempDir::new().unwrap();
        let runner = SystemRunner::with_search_path(tmp.path());

        let err = runner.find_program("podman").unwrap_err();
        assert_matches!(err, Error::ProgramNotFound { program } if program == "podman");
    }

    #[cfg(unix)]
    #[test]
    fn test_find_program_skips_non_executable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("podman"), "not executable").unwrap();
        let runner = SystemRunner::with_search_path(tmp.path());

        assert!(runner.find_program("podman").is_err());

        let path = make_executable(tmp.path(), "podman", "#!/bin/sh\nexit 0\n");
        assert_eq!(runner.find_program("podman").unwrap(), path);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_stdout() {
        let tmp = TempDir::new().unwrap();
        let path = make_executable(tmp.path(), "echoer", "#!/bin/sh\necho \"$@\"\n");
        let runner = SystemRunner::with_search_path(tmp.path());

        let output = runner
            .run(&path, &["mon".to_string(), "stat".to_string()])
            .unwrap();
        assert_eq!(output.stdout.trim(), "mon stat");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_nonzero_exit() {
        let tmp = TempDir::new().unwrap();
        let path = make_executable(tmp.path(), "failer", "#!/bin/sh\necho boom >&2\nexit 4\n");
        let runner = SystemRunner::with_search_path(tmp.path());

        let err = runner.run(&path, &[]).unwrap_err();
        assert_matches!(
            err,
            Error::CommandFailed { status: 4, ref stderr, .. } if stderr == "boom"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_output_keeps_nonzero_status() {
        let tmp = TempDir::new().unwrap();
        let script = "#!/bin/sh\necho 'No minions matched'\nexit 2\n";
        let path = make_executable(tmp.path(), "salt", script);
        let runner = SystemRunner::with_search_path(tmp.path());

        let output = runner.output_named("salt", &[]).unwrap();
        assert_eq!(output.status, 2);
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "No minions matched");
        assert_eq!(runner.output(&path, &[]).unwrap().status, 2);
    }

    #[test]
    fn test_render_command() {
        let line = render_command(
            Path::new("/usr/bin/systemctl"),
            &["start".to_string(), "ceph-mon@a.service".to_string()],
        );
        assert_eq!(line, "/usr/bin/systemctl start ceph-mon@a.service");
    }
}
