//! scaffold-e2e - end-to-end harness for scaffolded cluster projects
//!
//! Runs scenario files (or the built-in scaffold workflow) against the
//! cluster, scaffolding and container CLIs.

use clap::Parser;
use commands::{Commands, ContextArgs};
use scaffold_e2e::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "scaffold-e2e", about = "End-to-end harness for scaffolded cluster projects")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    context: ContextArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    logging::init_cli();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.command, cli.context).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
