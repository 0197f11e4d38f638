//! scaffold-e2e - end-to-end harness for scaffolded cluster projects
//!
//! Runs the cluster, scaffolding and container CLIs as external processes,
//! captures their output, and fails the running test on any error.

pub mod cli;
pub mod commands;
pub mod common;
pub mod framework;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Config, Error, Result};
pub use framework::{CommandBuilder, CommandKind, Framework};
