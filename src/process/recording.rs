//! Recording Runner
//!
//! A [`CommandRunner`] that records every invocation instead of spawning it.
//! Backs the CLI `--dry-run` mode and the orchestration tests.

use crate::domain::ports::{render_command, CommandOutput, CommandRunner};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// One recorded program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RecordedCall {
    /// Full command line as a single string
    pub fn line(&self) -> String {
        render_command(&self.program, &self.args)
    }

    /// Whether the command line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.line().contains(needle)
    }
}

/// Scripted response keyed on a command line substring
#[derive(Debug, Clone)]
struct Script {
    needle: String,
    status: i32,
    stdout: String,
}

/// Programs handed to another runner instead of being recorded
struct Delegate {
    runner: Arc<dyn CommandRunner>,
    programs: HashSet<String>,
}

impl Delegate {
    fn handles(&self, program: &Path) -> bool {
        program
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| self.programs.contains(name))
    }
}

impl std::fmt::Debug for Delegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegate")
            .field("programs", &self.programs)
            .finish()
    }
}

/// Runner that records calls and answers from a script
#[derive(Debug)]
pub struct RecordingRunner {
    bin_dir: PathBuf,
    missing: HashSet<String>,
    scripts: Vec<Script>,
    delegate: Option<Delegate>,
    calls: Mutex<Vec<RecordedCall>>,
    echo: bool,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("/usr/bin"),
            missing: HashSet::new(),
            scripts: Vec::new(),
            delegate: None,
            calls: Mutex::new(Vec::new()),
            echo: false,
        }
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that logs every command it would have run
    pub fn dry_run() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Really run `programs` through `runner`.
    ///
    /// Read-only lookups (Salt queries) keep working during a dry run while
    /// everything else is only recorded.
    pub fn delegate<I, S>(mut self, runner: Arc<dyn CommandRunner>, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delegate = Some(Delegate {
            runner,
            programs: programs.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Pretend `program` is not installed
    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Answer commands containing `needle` with `stdout`
    pub fn respond(self, needle: &str, stdout: &str) -> Self {
        self.fail_with(needle, 0, stdout)
    }

    /// Fail commands containing `needle` with exit `status`
    pub fn fail_on(self, needle: &str, status: i32) -> Self {
        self.fail_with(needle, status, "")
    }

    /// Exit commands containing `needle` with `status`, printing `stdout`
    pub fn fail_with(mut self, needle: &str, status: i32, stdout: &str) -> Self {
        self.scripts.push(Script {
            needle: needle.to_string(),
            status,
            stdout: stdout.to_string(),
        });
        self
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Command lines of all calls so far
    pub fn lines(&self) -> Vec<String> {
        self.calls.lock().iter().map(RecordedCall::line).collect()
    }

    /// Whether any recorded call contains `needle`
    pub fn called(&self, needle: &str) -> bool {
        self.calls.lock().iter().any(|call| call.contains(needle))
    }
}

impl CommandRunner for RecordingRunner {
    fn find_program(&self, name: &str) -> Result<PathBuf> {
        if self.missing.contains(name) {
            return Err(Error::ProgramNotFound {
                program: name.to_string(),
            });
        }
        match &self.delegate {
            Some(delegate) if delegate.programs.contains(name) => {
                delegate.runner.find_program(name)
            }
            _ => Ok(self.bin_dir.join(name)),
        }
    }

    fn output(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        if let Some(delegate) = self.delegate.as_ref().filter(|d| d.handles(program)) {
            return delegate.runner.output(program, args);
        }

        let call = RecordedCall {
            program: program.to_path_buf(),
            args: args.to_vec(),
        };
        let line = call.line();
        if self.echo {
            info!("[dry-run] {}", line);
        }
        self.calls.lock().push(call);

        Ok(self
            .scripts
            .iter()
            .find(|script| line.contains(&script.needle))
            .map(|script| CommandOutput {
                status: script.status,
                stdout: script.stdout.clone(),
                stderr: if script.status == 0 {
                    String::new()
                } else {
                    "scripted failure".to_string()
                },
            })
            .unwrap_or_default())
    }
}
