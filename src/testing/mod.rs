//! Scenario runner
//!
//! Reads YAML workflows (a list of `By` steps, each one external command)
//! and runs them through the fail-fast framework, cleaning up after itself
//! even when a step fails.

mod config;
mod runner;

pub use config::*;
pub use runner::{classify_panic, run_scenario, RunOptions, StepOutcome, TestResult, Vars};
