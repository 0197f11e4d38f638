//! Scenario runner
//!
//! Every step runs on its own task through the fail-fast path, so a failed
//! command unwinds only that task. The runner turns the unwind into a
//! result, runs the cleanup registered so far, and reports. Panics raised
//! inside a step are not echoed by the default panic hook; the runner prints
//! the step's log and failure message instead.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::common::{Error, Result};
use crate::framework::{Framework, MemorySink, Skipped};

use super::config::{OutputExpectation, Scenario, StepCommand};

tokio::task_local! {
    /// Set while a step's task runs
    static IN_STEP: ();
}

fn in_step() -> bool {
    IN_STEP.try_with(|_| ()).is_ok()
}

/// Keep the panic hook quiet for panics the runner reports itself
fn quiet_step_panics() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if !in_step() {
                previous(info);
            }
        }));
    });
}

/// Result of a scenario run
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub skipped: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// How a step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    Failed(String),
    Skipped(String),
}

/// Runner settings
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Replay every step's log, not only the failed ones
    pub verbose: bool,
    /// Print nothing to stdout
    pub quiet: bool,
}

/// A step command with every variable expanded
#[derive(Debug, Clone)]
struct PreparedCommand {
    kind: String,
    args: Vec<String>,
    stdin: Option<String>,
    timeout: Option<Duration>,
    env: Option<Vec<(String, String)>>,
}

/// Variables available to scenario files
#[derive(Debug, Clone)]
pub struct Vars(HashMap<String, String>);

impl Vars {
    /// Built-ins (`PROJECT_DIR`, `TIMESTAMP`) plus the scenario's own vars
    pub fn for_scenario(framework: &Framework, scenario: &Scenario) -> Result<Self> {
        let mut builtins = HashMap::new();
        builtins.insert(
            "PROJECT_DIR".to_string(),
            framework.config().project.dir.display().to_string(),
        );
        builtins.insert(
            "TIMESTAMP".to_string(),
            chrono::Local::now().format("%Y%m%d%H%M%S%3f").to_string(),
        );
        let builtins = Vars(builtins);

        let mut vars = builtins.0.clone();
        for (name, value) in &scenario.vars {
            vars.insert(name.clone(), builtins.expand(value)?);
        }
        Ok(Vars(vars))
    }

    /// Replace every `${NAME}` in `input`
    pub fn expand(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| Error::Scenario(format!("Unterminated variable in '{}'", input)))?;
            let name = &after[..end];
            let value = self
                .0
                .get(name)
                .ok_or_else(|| Error::Scenario(format!("Unknown variable '{}' in '{}'", name, input)))?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn prepare(&self, command: &StepCommand) -> Result<PreparedCommand> {
        let args = command
            .args
            .iter()
            .map(|arg| self.expand(arg))
            .collect::<Result<Vec<_>>>()?;
        let stdin = command.stdin.as_deref().map(|s| self.expand(s)).transpose()?;
        let env = match &command.env {
            Some(env) => Some(
                env.iter()
                    .map(|(k, v)| Ok((k.clone(), self.expand(v)?)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        Ok(PreparedCommand {
            kind: command.run.clone(),
            args,
            stdin,
            timeout: command.timeout_secs.map(Duration::from_secs),
            env,
        })
    }

    fn prepare_expectation(&self, expect: &OutputExpectation) -> Result<OutputExpectation> {
        Ok(OutputExpectation {
            contains: expect.contains.as_deref().map(|s| self.expand(s)).transpose()?,
            equals: expect.equals.as_deref().map(|s| self.expand(s)).transpose()?,
        })
    }
}

/// Run a scenario against the configured tools
pub async fn run_scenario(framework: &Framework, scenario: Scenario, opts: RunOptions) -> TestResult {
    quiet_step_panics();
    let steps_total = scenario.steps.len();
    let say = |line: String| {
        if !opts.quiet {
            println!("{}", line);
        }
    };

    say(format!(
        "\n{} {}",
        "Running Scenario:".blue().bold(),
        scenario.name.white().bold()
    ));
    if let Some(desc) = &scenario.description {
        say(format!("  {}", desc.dimmed()));
    }

    let vars = match Vars::for_scenario(framework, &scenario) {
        Ok(vars) => vars,
        Err(e) => {
            return TestResult {
                name: scenario.name,
                passed: false,
                skipped: false,
                steps_run: 0,
                steps_total,
                error: Some(e.to_string()),
            }
        }
    };

    let mut deferred: Vec<(String, PreparedCommand)> = Vec::new();
    let mut outcome = StepOutcome::Passed;
    let mut steps_run = 0;

    for step in &scenario.steps {
        steps_run += 1;
        say(format!("{} {}", "STEP:".cyan(), step.by));

        let prepared = vars.prepare(&step.command).and_then(|command| {
            let expect = step
                .expect
                .as_ref()
                .map(|e| vars.prepare_expectation(e))
                .transpose()?;
            Ok((command, expect))
        });
        let (command, expect) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                outcome = StepOutcome::Failed(e.to_string());
                say(format!("  {} {}", "✗".red(), e));
                break;
            }
        };

        let step_outcome = run_step(framework, command, expect, opts, &say).await;
        if step_outcome != StepOutcome::Passed {
            outcome = step_outcome;
            break;
        }

        if let Some(cleanup) = &step.defer {
            match vars.prepare(cleanup) {
                Ok(cleanup) => deferred.push((step.by.clone(), cleanup)),
                Err(e) => {
                    outcome = StepOutcome::Failed(e.to_string());
                    break;
                }
            }
        }
    }

    while let Some((by, cleanup)) = deferred.pop() {
        say(format!("{} {}", "DEFER:".cyan(), by));
        let cleanup_outcome = run_step(framework, cleanup, None, opts, &say).await;
        if outcome == StepOutcome::Passed {
            outcome = cleanup_outcome;
        }
    }

    let (passed, skipped, error) = match outcome {
        StepOutcome::Passed => {
            say(format!("\n{} {}\n", "✓".green().bold(), "Scenario Passed".green().bold()));
            (true, false, None)
        }
        StepOutcome::Skipped(reason) => {
            say(format!("\n{} {}\n", "-".yellow().bold(), "Scenario Skipped".yellow().bold()));
            (false, true, Some(reason))
        }
        StepOutcome::Failed(reason) => {
            say(format!("\n{} {}\n", "✗".red().bold(), "Scenario Failed".red().bold()));
            (false, false, Some(reason))
        }
    };

    TestResult {
        name: scenario.name,
        passed,
        skipped,
        steps_run,
        steps_total,
        error,
    }
}

/// Run one command on its own task with its own log
async fn run_step(
    framework: &Framework,
    command: PreparedCommand,
    expect: Option<OutputExpectation>,
    opts: RunOptions,
    say: &impl Fn(String),
) -> StepOutcome {
    let log = Arc::new(MemorySink::new());
    let scoped = framework.with_sink(log.clone());

    let outcome = match tokio::spawn(IN_STEP.scope((), execute(scoped, command, expect))).await {
        Ok(()) => StepOutcome::Passed,
        Err(e) if e.is_panic() => classify_panic(e.into_panic()),
        Err(e) => StepOutcome::Failed(format!("Step task was cancelled: {}", e)),
    };

    if opts.verbose || outcome != StepOutcome::Passed {
        for line in log.lines() {
            say(format!("    {}", line.dimmed()));
        }
    }
    match &outcome {
        StepOutcome::Passed => say(format!("  {}", "✓".green())),
        StepOutcome::Failed(reason) => say(format!("  {} {}", "✗".red(), reason)),
        StepOutcome::Skipped(reason) => say(format!("  {} {}", "-".yellow(), reason)),
    }
    outcome
}

async fn execute(framework: Framework, command: PreparedCommand, expect: Option<OutputExpectation>) {
    let mut builder = framework.command_named(&command.kind, command.args);
    if let Some(data) = command.stdin {
        builder = builder.with_stdin_data(data);
    }
    if let Some(timeout) = command.timeout {
        builder = builder.with_timeout(timeout);
    }
    if let Some(env) = command.env {
        builder = builder.with_env(env);
    }

    let stdout = builder.exec_or_die().await;

    if let Some(expect) = expect {
        if let Some(needle) = &expect.contains {
            if !stdout.contains(needle.as_str()) {
                framework.fail(&format!(
                    "Expected output containing {:?}, got {:?}",
                    needle, stdout
                ));
            }
        }
        if let Some(expected) = &expect.equals {
            if &stdout != expected {
                framework.fail(&format!("Expected output {:?}, got {:?}", expected, stdout));
            }
        }
    }
}

/// Map a step's panic payload to an outcome
pub fn classify_panic(payload: Box<dyn Any + Send>) -> StepOutcome {
    let payload = match payload.downcast::<Skipped>() {
        Ok(skipped) => return StepOutcome::Skipped(skipped.0),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<String>() {
        Ok(msg) => return StepOutcome::Failed(*msg),
        Err(payload) => payload,
    };
    match payload.downcast::<&'static str>() {
        Ok(msg) => StepOutcome::Failed(msg.to_string()),
        Err(_) => StepOutcome::Failed("Step panicked".to_string()),
    }
}
