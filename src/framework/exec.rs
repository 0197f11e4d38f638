//! Running a command: spawn, feed stdin, capture output, race the timeout

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::task::JoinHandle;

use super::{CommandBuilder, LogLevel, LogSink, Stdin, TimeoutSignal};
use crate::common::{Error, Result};

/// Exit code reported when waiting on the child failed outright
const WAIT_FAILED_CODE: i32 = 127;

/// Exit code reported when the child was terminated by a signal
const SIGNALED_CODE: i32 = -1;

/// Bytes written by the child so far, shared with the task draining the pipe
#[derive(Clone, Default)]
struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    fn append(&self, chunk: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(chunk);
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
    }
}

impl CommandBuilder {
    /// Run the command and return its standard output
    ///
    /// Never fails the test by itself: every outcome other than a zero exit
    /// status comes back as an [`Error`].
    pub async fn exec(self) -> Result<String> {
        let command_line = self.to_string();
        let sink = Arc::clone(self.framework.sink());
        let CommandBuilder {
            program,
            args,
            current_dir,
            env,
            stdin,
            timeout,
            ..
        } = self;

        let mut cmd = Command::new(locate(&program));
        cmd.args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &current_dir {
            cmd.current_dir(dir);
        }
        if let Some(env) = &env {
            cmd.env_clear();
            cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        sink.log(LogLevel::Info, &format!("Running '{}'", command_line));

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                return Err(Error::CommandStart {
                    command: command_line,
                    stdout: String::new(),
                    stderr: String::new(),
                    source,
                })
            }
        };

        let stdout = CaptureBuffer::default();
        let stderr = CaptureBuffer::default();
        let readers = [
            spawn_capture(child.stdout.take(), stdout.clone()),
            spawn_capture(child.stderr.take(), stderr.clone()),
        ];
        if let (Some(input), Some(pipe)) = (stdin, child.stdin.take()) {
            tokio::spawn(feed_stdin(pipe, input));
        }

        let mut timeout = timeout.unwrap_or_else(TimeoutSignal::never);
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = &mut timeout => None,
        };

        let Some(status) = exited else {
            if let Err(e) = child.kill().await {
                sink.log(
                    LogLevel::Warn,
                    &format!("Failed to kill '{}': {}", command_line, e),
                );
            }
            let (stdout, stderr) = (stdout.text(), stderr.text());
            log_streams(sink.as_ref(), &stdout, &stderr);
            return Err(Error::CommandTimedOut {
                command: command_line,
                stdout,
                stderr,
            });
        };

        // The child is gone; a descendant may still hold the pipes open
        let [mut out_reader, mut err_reader] = readers;
        let drained = tokio::select! {
            _ = async {
                // Join errors only come from a panicked reader
                let _ = (&mut out_reader).await;
                let _ = (&mut err_reader).await;
            } => true,
            _ = &mut timeout => false,
        };
        if !drained {
            out_reader.abort();
            err_reader.abort();
            tracing::debug!("Output of '{}' still open after exit", command_line);
        }

        let (stdout, stderr) = (stdout.text(), stderr.text());
        log_streams(sink.as_ref(), &stdout, &stderr);

        match status {
            Ok(status) if status.success() => Ok(stdout),
            Ok(status) => {
                let code = exit_code(&status);
                sink.log(LogLevel::Info, &format!("rc: {}", code));
                Err(Error::CommandFailed {
                    command: command_line,
                    stdout,
                    stderr,
                    reason: status.to_string(),
                    code,
                })
            }
            Err(e) => Err(Error::CommandFailed {
                command: command_line,
                stdout,
                stderr,
                reason: e.to_string(),
                code: WAIT_FAILED_CODE,
            }),
        }
    }
}

/// Where to spawn `program` from
///
/// Bare names are looked up on this process's `PATH`, so replacing the
/// child's environment does not change which executable runs. A name that
/// cannot be found is kept as-is and fails at spawn.
fn locate(program: &Path) -> PathBuf {
    if program.components().count() > 1 {
        return program.to_path_buf();
    }
    which::which(program).unwrap_or_else(|_| program.to_path_buf())
}

fn spawn_capture<R>(pipe: Option<R>, buffer: CaptureBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buffer.append(&chunk[..n]),
                Err(e) => {
                    tracing::debug!("Stopped capturing output: {}", e);
                    break;
                }
            }
        }
    })
}

/// Write the input and close the pipe so the child sees EOF
async fn feed_stdin(mut pipe: ChildStdin, input: Stdin) {
    let result = match input {
        Stdin::Data(data) => pipe.write_all(data.as_bytes()).await,
        Stdin::Reader(mut reader) => tokio::io::copy(&mut reader, &mut pipe).await.map(|_| ()),
    };
    if let Err(e) = result {
        // Usually a child that exited without reading all of its input
        tracing::debug!("Failed to write stdin: {}", e);
    }
    let _ = pipe.shutdown().await;
}

fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALED_CODE)
}

fn log_streams(sink: &dyn LogSink, stdout: &str, stderr: &str) {
    sink.log(LogLevel::Info, &format!("stderr: {:?}", stderr));
    sink.log(LogLevel::Info, &format!("stdout: {:?}", stdout));
}
