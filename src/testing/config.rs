//! Scenario configuration types
//!
//! Defines the data structures for deserializing YAML scenarios.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};

/// The workflow that runs when no scenario file is given
const BUILTIN_WORKFLOW: &str = include_str!("../../scenarios/scaffold_workflow.yaml");

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// Extra variables; values may use the built-in variables
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    /// Steps, run in order until one fails
    pub steps: Vec<Step>,
}

/// A single step in the workflow
#[derive(Deserialize, Debug, Clone)]
pub struct Step {
    /// What the step does, printed as `STEP: <by>`
    pub by: String,
    #[serde(flatten)]
    pub command: StepCommand,
    /// Assertions on the command's stdout
    pub expect: Option<OutputExpectation>,
    /// Cleanup registered once this step has passed
    pub defer: Option<StepCommand>,
}

/// A command invocation inside a step
#[derive(Deserialize, Debug, Clone)]
pub struct StepCommand {
    /// Command kind: `cluster`, `scaffold` or `container`
    pub run: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Data written to the command's stdin
    pub stdin: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Replaces the command's environment
    pub env: Option<BTreeMap<String, String>>,
}

/// Expectations for a step's output
#[derive(Deserialize, Debug, Clone, Default)]
pub struct OutputExpectation {
    /// Substring that should be in stdout
    pub contains: Option<String>,
    /// Exact stdout
    pub equals: Option<String>,
}

impl Scenario {
    /// Load and parse a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)
            .map_err(|e| Error::Scenario(format!("Failed to parse scenario: {}", e)))?;
        if scenario.steps.is_empty() {
            return Err(Error::Scenario(format!(
                "Scenario '{}' has no steps",
                scenario.name
            )));
        }
        Ok(scenario)
    }

    /// The built-in scaffold workflow
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_WORKFLOW)
    }
}
