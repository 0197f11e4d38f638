//! The external tools the harness knows how to drive

use std::fmt;
use std::str::FromStr;

use crate::common::Error;

/// Logical category of external tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Cluster CLI (kubectl), invoked with the configured server/credential flags
    Cluster,
    /// Project-scaffolding CLI (kubebuilder), run inside the project directory
    Scaffold,
    /// Container-build CLI (docker)
    Container,
}

impl CommandKind {
    pub const ALL: [CommandKind; 3] = [Self::Cluster, Self::Scaffold, Self::Container];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Scaffold => "scaffold",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = Error;

    /// Accepts the kind names plus the tool names and the `<tool>-command`
    /// spellings used by older scenario files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cluster" | "kubectl" | "kubectl-command" => Ok(Self::Cluster),
            "scaffold" | "kubebuilder" | "kubebuilder-command" => Ok(Self::Scaffold),
            "container" | "docker" | "docker-command" => Ok(Self::Container),
            other => Err(Error::UnknownCommandKind(other.to_string())),
        }
    }
}
