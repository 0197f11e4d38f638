//! Command-execution framework for end-to-end tests
//!
//! A [`Framework`] couples the harness configuration with an injected
//! [`LogSink`]. It builds [`CommandBuilder`]s for the three external tools,
//! runs them, and turns failures into test failures.

mod builder;
mod exec;
mod fail;
mod kind;
mod log;

use std::fmt;
use std::sync::Arc;

pub use builder::{CommandBuilder, Stdin, TimeoutSignal};
pub use fail::{fail, skip, Skipped};
pub use kind::CommandKind;
pub use log::{format_line, now_stamp, LogLevel, LogSink, MemorySink, TracingSink, WriterSink};

use crate::common::{Config, Result};

/// Shared handle to the configuration and log sink
#[derive(Clone)]
pub struct Framework {
    config: Arc<Config>,
    sink: Arc<dyn LogSink>,
}

impl Framework {
    pub fn new(config: Config, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    /// Same configuration, different log destination
    pub fn with_sink(&self, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config: Arc::clone(&self.config),
            sink,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.sink.log(level, message);
    }

    pub fn info(&self, message: &str) {
        self.sink.log(LogLevel::Info, message);
    }

    pub fn fail(&self, message: &str) -> ! {
        fail(self.sink.as_ref(), message)
    }

    pub fn skip(&self, message: &str) -> ! {
        skip(self.sink.as_ref(), message)
    }

    /// Build a command for `kind`
    pub fn command<I, S>(&self, kind: CommandKind, args: I) -> CommandBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandBuilder::new(
            self.clone(),
            kind,
            args.into_iter().map(Into::into).collect(),
        )
    }

    /// Build a command from a kind name, failing the test if the name is
    /// not a known kind
    pub fn command_named<I, S>(&self, kind: &str, args: I) -> CommandBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match kind.parse::<CommandKind>() {
            Ok(kind) => self.command(kind, args),
            Err(e) => self.fail(&e.to_string()),
        }
    }

    pub async fn run_command<I, S>(&self, kind: CommandKind, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(kind, args).exec().await
    }

    pub async fn run_command_or_die<I, S>(&self, kind: CommandKind, args: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(kind, args).exec_or_die().await
    }

    /// Like [`Framework::run_command_or_die`], with `data` on stdin
    pub async fn run_command_or_die_input<I, S>(
        &self,
        kind: CommandKind,
        data: &str,
        args: I,
    ) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(kind, args)
            .with_stdin_data(data)
            .exec_or_die()
            .await
    }
}

impl fmt::Debug for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framework")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
