//! Policy Module
//!
//! Expands the role policy (`policy.cfg`) into per-minion role pillar files
//! and the cluster-global pillar.

pub mod expander;
pub mod global;
pub mod loader;
pub mod resolver;
pub mod roles;

pub use expander::*;
pub use global::*;
pub use loader::*;
pub use resolver::*;
pub use roles::*;
