//! Execution Context Adapters
//!
//! Implementations of [`ExecutionContext`](crate::domain::ports::ExecutionContext):
//! a live Salt-backed context and a static inventory context.

pub mod inventory;
pub mod salt;

pub use inventory::*;
pub use salt::*;
