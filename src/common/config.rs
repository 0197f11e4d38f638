//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Where the cluster CLI should point
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Executables used for each command kind
    #[serde(default)]
    pub tools: ToolPaths,

    /// Project under test
    #[serde(default)]
    pub project: ProjectConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Server and credential context passed to every cluster CLI invocation
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ClusterConfig {
    /// API server address (`--server`)
    pub host: Option<String>,

    /// Path to a kubeconfig file (`--kubeconfig`)
    pub kubeconfig: Option<PathBuf>,

    /// Context inside the kubeconfig (`--context`), only used with `kubeconfig`
    pub context: Option<String>,

    /// Directory holding `ca.crt`, `kubecfg.crt` and `kubecfg.key`,
    /// only used when no kubeconfig is set
    pub cert_dir: Option<PathBuf>,
}

/// Executable paths for the three command kinds
#[derive(Debug, Deserialize, Clone)]
pub struct ToolPaths {
    #[serde(default = "default_cluster_cli")]
    pub cluster: PathBuf,

    #[serde(default = "default_scaffold_cli")]
    pub scaffold: PathBuf,

    #[serde(default = "default_container_cli")]
    pub container: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            cluster: default_cluster_cli(),
            scaffold: default_scaffold_cli(),
            container: default_container_cli(),
        }
    }
}

fn default_cluster_cli() -> PathBuf {
    PathBuf::from("kubectl")
}
fn default_scaffold_cli() -> PathBuf {
    PathBuf::from("kubebuilder")
}
fn default_container_cli() -> PathBuf {
    PathBuf::from("docker")
}

/// Project settings
#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    /// Working directory of the scaffold CLI
    #[serde(default = "default_project_dir")]
    pub dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            dir: default_project_dir(),
        }
    }
}

fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Default timeout for every command; unset means commands may run forever
    #[serde(default)]
    pub command_secs: Option<u64>,

    /// Delay before probing the cluster CLI after a timeout
    #[serde(default = "default_probe_delay")]
    pub probe_delay_ms: u64,

    /// Upper bound for the probe itself
    #[serde(default = "default_probe")]
    pub probe_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command_secs: None,
            probe_delay_ms: default_probe_delay(),
            probe_secs: default_probe(),
        }
    }
}

fn default_probe_delay() -> u64 {
    2000
}
fn default_probe() -> u64 {
    30
}

impl Timeouts {
    pub fn command(&self) -> Option<Duration> {
        self.command_secs.map(Duration::from_secs)
    }

    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve a configured tool on `PATH`
    ///
    /// Absolute and relative paths with a directory component are checked
    /// as-is.
    pub fn resolve_tool(path: &Path) -> Option<PathBuf> {
        if path.components().count() > 1 {
            return path.is_file().then(|| path.to_path_buf());
        }
        which::which(path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tools.cluster, PathBuf::from("kubectl"));
        assert_eq!(config.tools.scaffold, PathBuf::from("kubebuilder"));
        assert_eq!(config.tools.container, PathBuf::from("docker"));
        assert_eq!(config.project.dir, PathBuf::from("."));
        assert!(config.cluster.host.is_none());
        assert_eq!(config.timeouts.probe_delay(), Duration::from_secs(2));
        assert!(config.timeouts.command().is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
[cluster]
host = "https://127.0.0.1:6443"
kubeconfig = "/tmp/kubeconfig"

[tools]
container = "/usr/local/bin/podman"

[timeouts]
command_secs = 600
probe_delay_ms = 10
"#,
        )
        .unwrap();

        assert_eq!(config.cluster.host.as_deref(), Some("https://127.0.0.1:6443"));
        assert_eq!(config.cluster.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert_eq!(config.tools.cluster, PathBuf::from("kubectl"));
        assert_eq!(config.tools.container, PathBuf::from("/usr/local/bin/podman"));
        assert_eq!(config.timeouts.command(), Some(Duration::from_secs(600)));
        assert_eq!(config.timeouts.probe_delay(), Duration::from_millis(10));
        assert_eq!(config.timeouts.probe_secs, 30);
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tools\ncluster = 1").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::ConfigParse(_))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load_from(&missing), Err(Error::FileRead { .. })));
    }
}
