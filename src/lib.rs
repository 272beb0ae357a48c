//! Ceph Salt Deploy
//!
//! Deployment glue for running a Ceph cluster under Salt: expansion of the
//! role policy into per-minion pillar data, and lifecycle management of
//! containerized monitor and manager daemons under systemd.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐   ┌──────────────────────────────────┐
//! │         Policy Expander          │   │      Container Orchestrator      │
//! │                                  │   │                                  │
//! │  policy.cfg ─► resolve targets   │   │  keyrings ─► monmap ─► mkfs      │
//! │            ─► invert to minions  │   │          ─► unit file            │
//! │            ─► <minion>.sls       │   │          ─► systemctl            │
//! │            ─► global.yml         │   │                                  │
//! └────────────────┬─────────────────┘   └───────┬──────────────────┬───────┘
//!                  │                             │                  │
//!         ┌────────┴─────────────────────────────┴───┐     ┌────────┴───────┐
//!         │            Execution Context             │     │ Command Runner │
//!         │  grains · pillar · targeting (Salt)      │     │ podman·systemctl│
//!         └──────────────────────────────────────────┘     └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`policy`]: Role policy loading, resolution, inversion and pillar output
//! - [`container`]: Containerized Ceph tooling and daemon lifecycle
//! - [`context`]: Salt-backed and static execution contexts
//! - [`process`]: External program execution
//! - [`domain`]: Core port traits
//! - [`config`]: Settings
//! - [`error`]: Error types and handling

pub mod config;
pub mod container;
pub mod context;
pub mod domain;
pub mod error;
pub mod policy;
pub mod process;

// Re-export commonly used types
pub use config::{CephLayout, ContainerSettings, PolicySettings, SaltSettings, Settings};

pub use container::{
    CephOrchestrator, ContainerInvocation, ContainerRuntime, DaemonUnit, MonBootstrap, MonCreate,
    OrchestrationReport, StepRecord, Systemd, UserIds, VolumeMount,
};

pub use context::{SaltContext, StaticContext};

pub use domain::ports::{CommandOutput, CommandRunner, DaemonKind, ExecutionContext, NodeId};

pub use error::{Error, ErrorKind, Result};

pub use policy::{
    strip_role_prefix, ClusterGlobalConfig, DeployReport, NodeRoleAssignment, PolicyExpander,
    ResolvedPolicy, RolePolicy, RolesPillar,
};

pub use process::{RecordingRunner, SystemRunner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
