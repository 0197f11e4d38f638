//! CLI command definitions
//!
//! Defines the clap commands for the e2e harness.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a YAML scenario (the built-in scaffold workflow when no path is given)
    Run {
        /// Path to the YAML scenario file
        path: Option<PathBuf>,

        /// Show every step's command log, not only failed ones
        #[arg(long, short)]
        verbose: bool,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a single command and print its stdout
    Exec {
        /// Command kind: cluster, scaffold or container
        kind: String,

        /// Data to write to the command's stdin
        #[arg(long)]
        stdin: Option<String>,

        /// Kill the command after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Arguments to pass to the tool
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Show which executable each command kind resolves to
    Check {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options that override the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct ContextArgs {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API server address for the cluster CLI
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Kubeconfig file for the cluster CLI
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Context inside the kubeconfig
    #[arg(long, global = true)]
    pub kube_context: Option<String>,

    /// Directory with ca.crt, kubecfg.crt and kubecfg.key
    #[arg(long, global = true)]
    pub cert_dir: Option<PathBuf>,

    /// Project directory the scaffold CLI runs in
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Cluster CLI executable
    #[arg(long, global = true)]
    pub cluster_cli: Option<PathBuf>,

    /// Scaffold CLI executable
    #[arg(long, global = true)]
    pub scaffold_cli: Option<PathBuf>,

    /// Container CLI executable
    #[arg(long, global = true)]
    pub container_cli: Option<PathBuf>,
}
