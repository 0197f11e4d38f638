//! Command construction
//!
//! A [`CommandBuilder`] is a plain value: every `with_*` call consumes it and
//! hands back the updated builder, and [`CommandBuilder::exec`] consumes it
//! for good. Nothing is shared between two invocations.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::io::AsyncRead;
use tokio::sync::oneshot;

use super::{CommandKind, Framework};
use crate::common::config::ClusterConfig;

/// Data delivered on the child's standard input
pub enum Stdin {
    Data(String),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for Stdin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stdin::Data(data) => f.debug_tuple("Data").field(data).finish(),
            Stdin::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Resolves when a command has run for too long
pub struct TimeoutSignal(BoxFuture<'static, ()>);

impl TimeoutSignal {
    /// Fires `duration` after execution starts waiting on it
    pub fn after(duration: Duration) -> Self {
        Self(async move { tokio::time::sleep(duration).await }.boxed())
    }

    /// Fires when `signal` completes
    pub fn from_future<F>(signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(signal.boxed())
    }

    /// Fires when a value is sent; a dropped sender never fires
    pub fn from_receiver(receiver: oneshot::Receiver<()>) -> Self {
        Self(
            async move {
                if receiver.await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            .boxed(),
        )
    }

    pub fn never() -> Self {
        Self(std::future::pending().boxed())
    }
}

impl Future for TimeoutSignal {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().0.as_mut().poll(cx)
    }
}

impl fmt::Debug for TimeoutSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimeoutSignal(..)")
    }
}

/// A single external command, ready to run
#[derive(Debug)]
pub struct CommandBuilder {
    pub(super) framework: Framework,
    pub(super) kind: CommandKind,
    pub(super) program: PathBuf,
    pub(super) args: Vec<String>,
    pub(super) current_dir: Option<PathBuf>,
    pub(super) env: Option<Vec<(String, String)>>,
    pub(super) stdin: Option<Stdin>,
    pub(super) timeout: Option<TimeoutSignal>,
}

impl CommandBuilder {
    pub(super) fn new(framework: Framework, kind: CommandKind, args: Vec<String>) -> Self {
        let config = framework.config();
        let (program, args, current_dir) = match kind {
            CommandKind::Cluster => {
                let mut full = default_cluster_args(&config.cluster);
                full.extend(args);
                (config.tools.cluster.clone(), full, None)
            }
            CommandKind::Scaffold => (
                config.tools.scaffold.clone(),
                args,
                Some(config.project.dir.clone()),
            ),
            CommandKind::Container => (config.tools.container.clone(), args, None),
        };
        let timeout = config.timeouts.command().map(TimeoutSignal::after);

        Self {
            framework,
            kind,
            program,
            args,
            current_dir,
            env: None,
            stdin: None,
            timeout,
        }
    }

    /// Replace the child's environment entirely
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(TimeoutSignal::after(timeout));
        self
    }

    pub fn with_timeout_signal(mut self, signal: TimeoutSignal) -> Self {
        self.timeout = Some(signal);
        self
    }

    pub fn with_stdin_data(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(Stdin::Data(data.into()));
        self
    }

    pub fn with_stdin_reader<R>(mut self, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.stdin = Some(Stdin::Reader(Box::new(reader)));
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument list, default flags included
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

impl fmt::Display for CommandBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Server and credential flags for the cluster CLI
///
/// A kubeconfig wins over a certificate directory; the context is only
/// meaningful inside a kubeconfig.
fn default_cluster_args(cluster: &ClusterConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(host) = &cluster.host {
        args.push(format!("--server={}", host));
    }

    if let Some(kubeconfig) = &cluster.kubeconfig {
        args.push(format!("--kubeconfig={}", kubeconfig.display()));
        if let Some(context) = &cluster.context {
            args.push(format!("--context={}", context));
        }
    } else if let Some(cert_dir) = &cluster.cert_dir {
        args.push(format!(
            "--certificate-authority={}",
            cert_dir.join("ca.crt").display()
        ));
        args.push(format!(
            "--client-certificate={}",
            cert_dir.join("kubecfg.crt").display()
        ));
        args.push(format!("--client-key={}", cert_dir.join("kubecfg.key").display()));
    }

    args
}
