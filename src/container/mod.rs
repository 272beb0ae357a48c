//! Container Module
//!
//! Runs Ceph tooling in containers and manages monitor and manager daemons
//! as systemd-supervised containers.

pub mod invocation;
pub mod keyring;
pub mod mgr;
pub mod mon;
pub mod orchestrator;
pub mod report;
pub mod systemd;
pub mod unit;

pub use invocation::*;
pub use keyring::*;
pub use mon::*;
pub use orchestrator::*;
pub use report::*;
pub use systemd::*;
pub use unit::*;
