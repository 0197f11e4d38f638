//! Common utilities shared by the framework, the scenario runner and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::Config;
pub use error::{Error, Result};
