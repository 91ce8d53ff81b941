use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use harness::command::{BrowserCommand, execute};
use harness::gate::{exit_code, is_fatal};
use harness::io::artifacts::ArtifactPaths;
use harness::io::config::load_config_with_env;
use harness::io::run_report::RunReport;
use harness::io::shell::InterpreterShellRunner;
use harness::logging;
use harness::session::Session;
use harness::summary::{record_environment, render_summary};

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Provision and verify data planes through the control-plane console"
)]
struct Cli {
    /// Harness config file (TOML).
    #[arg(long, global = true, default_value = "harness.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Browser(BrowserCommand),
    /// Print the environment and everything recorded in the run report.
    Summary,
}

fn main() {
    logging::init();
    let result = run(Cli::parse());
    // Fatal errors were logged with their screenshot by the exit gate.
    if let Err(err) = &result
        && !is_fatal(err)
    {
        error!("{err:#}");
    }
    process::exit(exit_code(&result));
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config_with_env(&cli.config)?;
    let artifacts = ArtifactPaths::from_config(&config);
    let mut report = RunReport::open(&artifacts.report_path)?;

    let command = match cli.command {
        Command::Summary => {
            println!("{}", render_summary(&config, &report));
            return Ok(());
        }
        Command::Browser(command) => command,
    };

    record_environment(&mut report, &config)?;
    let session = Session::open(&config)?;
    let shell = InterpreterShellRunner::from_config(&config.commands);
    let result = execute(session.page(), &shell, &config, &mut report, command);
    if let Err(err) = session.close() {
        warn!(error = %err, "browser session did not close cleanly");
    }
    result
}
