//! Container Invocation
//!
//! Value object describing one run of a Ceph tool inside the Ceph image, and
//! the runtime that turns it into a command line and executes it.

use crate::domain::ports::CommandRunner;
use crate::error::Result;
use crate::process::render_command;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Volume Mounts
// =============================================================================

/// Bind mount of a host path into the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host: PathBuf,
    pub container: String,
    /// Mount options such as `z` or `ro`
    pub options: Option<String>,
}

impl VolumeMount {
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }

    /// `host:container[:options]` as passed to `-v`
    pub fn spec(&self) -> String {
        match &self.options {
            Some(options) => format!("{}:{}:{}", self.host.display(), self.container, options),
            None => format!("{}:{}", self.host.display(), self.container),
        }
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// One containerized program run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInvocation {
    pub image: String,
    /// Binary under `/usr/bin` inside the image
    pub entrypoint: String,
    pub args: Vec<String>,
    pub mounts: Vec<VolumeMount>,
    pub name: Option<String>,
    /// Extra flags placed right after the standard runtime flags
    pub runtime_flags: Vec<String>,
}

impl ContainerInvocation {
    pub fn new(image: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            entrypoint: entrypoint.into(),
            args: Vec::new(),
            mounts: Vec::new(),
            name: None,
            runtime_flags: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn mount(mut self, host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        self.mounts.push(VolumeMount::new(host, container));
        self
    }

    pub fn mount_with(
        mut self,
        host: impl Into<PathBuf>,
        container: impl Into<String>,
        options: &str,
    ) -> Self {
        self.mounts
            .push(VolumeMount::new(host, container).with_options(options));
        self
    }

    pub fn mounts(mut self, mounts: impl IntoIterator<Item = VolumeMount>) -> Self {
        self.mounts.extend(mounts);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn runtime_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime_flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Runtime arguments after the program name.
    ///
    /// Host networking and the image/node environment are always set, ahead
    /// of the caller's arguments.
    pub fn runtime_args(&self, node_name: &str) -> Vec<String> {
        let mut argv: Vec<String> = vec!["run".into(), "--rm".into(), "--net=host".into()];
        argv.extend(self.runtime_flags.iter().cloned());
        if let Some(name) = &self.name {
            argv.push("--name".into());
            argv.push(name.clone());
        }
        argv.push("-e".into());
        argv.push(format!("CONTAINER_IMAGE={}", self.image));
        argv.push("-e".into());
        argv.push(format!("NODE_NAME={}", node_name));
        for mount in &self.mounts {
            argv.push("-v".into());
            argv.push(mount.spec());
        }
        argv.push("--entrypoint".into());
        argv.push(format!("/usr/bin/{}", self.entrypoint));
        argv.push(self.image.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

// =============================================================================
// Daemon User
// =============================================================================

/// uid/gid the daemon drops to; zero means "stay root"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIds {
    pub uid: u32,
    pub gid: u32,
}

impl UserIds {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// `--setuser`/`--setgroup` flags for non-root ids
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.uid != 0 {
            args.push("--setuser".to_string());
            args.push(self.uid.to_string());
        }
        if self.gid != 0 {
            args.push("--setgroup".to_string());
            args.push(self.gid.to_string());
        }
        args
    }
}

// =============================================================================
// Container Runtime
// =============================================================================

/// Executes invocations through the container runtime binary
#[derive(Clone)]
pub struct ContainerRuntime {
    runner: Arc<dyn CommandRunner>,
    program: String,
    node_name: String,
}

impl ContainerRuntime {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            node_name: node_name.into(),
        }
    }

    /// Locate the runtime binary in the search path
    pub fn program_path(&self) -> Result<PathBuf> {
        self.runner.find_program(&self.program)
    }

    /// Full command line, runtime binary first
    pub fn command_line(&self, invocation: &ContainerInvocation) -> Result<Vec<String>> {
        let program = self.program_path()?;
        let mut line = vec![program.display().to_string()];
        line.extend(invocation.runtime_args(&self.node_name));
        Ok(line)
    }

    /// Run to completion and return stdout.
    ///
    /// Fails with `ProgramNotFound` before anything is spawned when the
    /// runtime is not installed.
    pub fn run(&self, invocation: &ContainerInvocation) -> Result<String> {
        let program = self.program_path()?;
        let args = invocation.runtime_args(&self.node_name);
        info!("{}", render_command(&program, &args));

        let output = self.runner.run(&program, &args)?;
        debug!("{}", output.stdout.trim_end());
        Ok(output.stdout)
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }
}

impl std::fmt::Debug for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRuntime")
            .field("program", &self.program)
            .field("node_name", &self.node_name)
            .finish()
    }
}
