//! Turning errors into test failures
//!
//! [`fail`] and [`skip`] unwind the current test. Under `cargo test` that
//! fails (or aborts) the test; the scenario runner catches the unwind at the
//! step boundary and reports it.

use super::log::now_stamp;
use super::{CommandBuilder, CommandKind, Framework, LogLevel, LogSink};

/// Panic payload raised by [`skip`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped(pub String);

/// Log `message` and fail the running test
pub fn fail(sink: &dyn LogSink, message: &str) -> ! {
    sink.log(LogLevel::Info, message);
    panic!("{}: {}", now_stamp(), message);
}

/// Log `message` and skip the running test
pub fn skip(sink: &dyn LogSink, message: &str) -> ! {
    sink.log(LogLevel::Info, message);
    std::panic::panic_any(Skipped(format!("{}: {}", now_stamp(), message)));
}

impl CommandBuilder {
    /// Run the command, failing the test on any error
    ///
    /// When a cluster command times out, the cluster CLI is asked for its
    /// version once more before failing, so the log shows whether the API
    /// server came back. The original error is reported either way.
    pub async fn exec_or_die(self) -> String {
        let framework = self.framework.clone();
        let kind = self.kind;

        match self.exec().await {
            Ok(stdout) => stdout,
            Err(err) => {
                if err.is_timeout() {
                    framework.info("Hit i/o timeout error.");
                    if kind == CommandKind::Cluster {
                        probe_cluster(&framework).await;
                    }
                }
                framework.fail(&format!("Unexpected error:\n{}", err))
            }
        }
    }
}

/// One `version` call against the cluster CLI, logged and otherwise ignored
async fn probe_cluster(framework: &Framework) {
    let timeouts = &framework.config().timeouts;
    let delay = timeouts.probe_delay();
    framework.info(&format!(
        "Talking to the server {:?} later to see if it's temporary.",
        delay
    ));
    tokio::time::sleep(delay).await;

    let result = framework
        .command(CommandKind::Cluster, ["version"])
        .with_timeout(timeouts.probe())
        .exec()
        .await;
    match result {
        Ok(stdout) => {
            framework.info(&format!("stdout: {:?}", stdout));
            framework.info("err: <nil>");
        }
        Err(e) => {
            framework.info("stdout: \"\"");
            framework.info(&format!("err: {}", e));
        }
    }
}
