//! Gear fixture runner
//!
//! Deploys programs to a Gear node, sends fixture messages and checks the
//! resulting message queue and shared memory step by step.

pub mod bindings;
pub mod chain;
pub mod commands;
pub mod common;
pub mod fixture;
pub mod runner;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use runner::{RunOptions, RunSummary, Runner};
