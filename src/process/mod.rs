//! Process Module
//!
//! Adapters for the [`CommandRunner`](crate::domain::ports::CommandRunner)
//! port: a real runner backed by `std::process` and a recording runner for
//! dry runs.

pub mod recording;
pub mod runner;

pub use recording::*;
pub use runner::*;
