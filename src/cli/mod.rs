//! CLI command handling
//!
//! Builds the framework from the configuration and dispatches commands.

use std::sync::Arc;
use std::time::Duration;

use crate::commands::{Commands, ContextArgs};
use crate::common::{Config, Error, Result};
use crate::framework::{CommandKind, Framework, TracingSink};
use crate::testing::{run_scenario, RunOptions, Scenario};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, context: ContextArgs) -> Result<()> {
    let config = load_config(context)?;
    let framework = Framework::new(config, Arc::new(TracingSink));

    match command {
        Commands::Run {
            path,
            verbose,
            json,
        } => {
            let scenario = match &path {
                Some(path) => Scenario::load(path)?,
                None => Scenario::builtin()?,
            };
            let opts = RunOptions {
                verbose,
                quiet: json,
            };
            let result = run_scenario(&framework, scenario, opts).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }

            if result.passed || result.skipped {
                Ok(())
            } else {
                Err(Error::TestAssertion(format!(
                    "Scenario '{}' failed at step {}/{}",
                    result.name, result.steps_run, result.steps_total
                )))
            }
        }

        Commands::Exec {
            kind,
            stdin,
            timeout,
            args,
        } => {
            let kind: CommandKind = kind.parse()?;
            let mut builder = framework.command(kind, args);
            if let Some(data) = stdin {
                builder = builder.with_stdin_data(data);
            }
            if let Some(secs) = timeout {
                builder = builder.with_timeout(Duration::from_secs(secs));
            }

            let stdout = builder.exec().await?;
            print!("{}", stdout);
            Ok(())
        }

        Commands::Check { json } => {
            check_tools(framework.config(), json);
            Ok(())
        }
    }
}

/// Configuration file, then command-line overrides
fn load_config(context: ContextArgs) -> Result<Config> {
    let mut config = match &context.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if context.host.is_some() {
        config.cluster.host = context.host;
    }
    if context.kubeconfig.is_some() {
        config.cluster.kubeconfig = context.kubeconfig;
    }
    if context.kube_context.is_some() {
        config.cluster.context = context.kube_context;
    }
    if context.cert_dir.is_some() {
        config.cluster.cert_dir = context.cert_dir;
    }
    if let Some(dir) = context.project_dir {
        config.project.dir = dir;
    }
    if let Some(path) = context.cluster_cli {
        config.tools.cluster = path;
    }
    if let Some(path) = context.scaffold_cli {
        config.tools.scaffold = path;
    }
    if let Some(path) = context.container_cli {
        config.tools.container = path;
    }

    Ok(config)
}

/// Report the configured and resolved executable for every kind
fn check_tools(config: &Config, json: bool) {
    let rows: Vec<_> = CommandKind::ALL
        .iter()
        .map(|kind| {
            let configured = match kind {
                CommandKind::Cluster => &config.tools.cluster,
                CommandKind::Scaffold => &config.tools.scaffold,
                CommandKind::Container => &config.tools.container,
            };
            (*kind, configured, Config::resolve_tool(configured))
        })
        .collect();

    if json {
        let entries: Vec<_> = rows
            .iter()
            .map(|(kind, configured, resolved)| {
                serde_json::json!({
                    "kind": kind,
                    "configured": configured,
                    "resolved": resolved,
                    "found": resolved.is_some(),
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "tools": entries }));
        return;
    }

    for (kind, configured, resolved) in &rows {
        match resolved {
            Some(path) => println!(
                "  {:10} {} -> {}",
                kind.name(),
                configured.display(),
                path.display()
            ),
            None => println!(
                "  {:10} {} (not found)",
                kind.name(),
                configured.display()
            ),
        }
    }
}
