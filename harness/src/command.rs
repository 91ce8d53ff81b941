//! Browser-driven CLI commands.
//!
//! [`execute`] opens the console, runs one command and routes any error that
//! escapes it through the exit gate.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use crate::core::naming::capability_card_id;
use crate::dataplane::DataPlanePage;
use crate::gate::into_fatal;
use crate::io::artifacts::ArtifactPaths;
use crate::io::config::HarnessConfig;
use crate::io::run_report::RunReport;
use crate::io::shell::ShellRunner;
use crate::page::Page;

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum BrowserCommand {
    /// Register a data plane, run its bootstrap commands and wait for the tunnel.
    CreateDataplane { name: String },
    /// Delete a data plane and drop its run report record.
    DeleteDataplane { name: String },
    /// Open a capability's detail page.
    OpenCapability {
        dataplane: String,
        capability: String,
        /// Open the capability even if its status is not ready.
        #[arg(long)]
        no_ready_check: bool,
    },
    /// Report whether a capability is provisioned on a data plane.
    CheckCapability {
        dataplane: String,
        capability: String,
        /// Require a provisioned instance with this name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Open an app's detail page.
    OpenApp { dataplane: String, app: String },
    /// Open the global data plane configuration page.
    GlobalConfig,
}

impl BrowserCommand {
    /// Screenshot context for errors that reach the gate without one.
    pub fn context(&self) -> &'static str {
        match self {
            Self::CreateDataplane { .. } => "create_dataplane",
            Self::DeleteDataplane { .. } => "delete_dataplane",
            Self::OpenCapability { .. } => "open_capability",
            Self::CheckCapability { .. } => "check_capability",
            Self::OpenApp { .. } => "open_app",
            Self::GlobalConfig => "global_config",
        }
    }
}

/// Run `command` against the console. Every error returned is a
/// [`FatalError`](crate::gate::FatalError) with a screenshot attempt behind it.
pub fn execute<P: Page, S: ShellRunner>(
    page: &P,
    shell: &S,
    config: &HarnessConfig,
    report: &mut RunReport,
    command: BrowserCommand,
) -> Result<()> {
    let context = command.context();
    drive(page, shell, config, report, command)
        .map_err(|err| into_fatal(page, &ArtifactPaths::from_config(config), err, context))
}

fn drive<P: Page, S: ShellRunner>(
    page: &P,
    shell: &S,
    config: &HarnessConfig,
    report: &mut RunReport,
    command: BrowserCommand,
) -> Result<()> {
    page.goto(&config.console.url)
        .with_context(|| format!("open console {}", config.console.url))?;
    page.wait_for_load()?;

    let mut dataplanes = DataPlanePage::new(page, shell, config, report);
    match command {
        BrowserCommand::CreateDataplane { name } => {
            let outcome = dataplanes.create_dataplane(&name)?;
            info!(dataplane = %name, ?outcome, "create-dataplane finished");
        }
        BrowserCommand::DeleteDataplane { name } => {
            let deleted = dataplanes.delete_dataplane(&name)?;
            info!(dataplane = %name, deleted, "delete-dataplane finished");
        }
        BrowserCommand::OpenCapability {
            dataplane,
            capability,
            no_ready_check,
        } => dataplanes.goto_capability(&dataplane, &capability, !no_ready_check)?,
        BrowserCommand::CheckCapability {
            dataplane,
            capability,
            name,
        } => {
            dataplanes.goto_dataplane(&dataplane)?;
            let provisioned = dataplanes.is_capability_provisioned(&capability, name.as_deref());
            if provisioned {
                report.set_capability_info(
                    &dataplane,
                    &capability_card_id(&capability),
                    "provisioned",
                    true,
                )?;
            }
            println!("{provisioned}");
        }
        BrowserCommand::OpenApp { dataplane, app } => {
            dataplanes.goto_app_detail(&dataplane, &app)?;
        }
        BrowserCommand::GlobalConfig => dataplanes.goto_global_dataplane()?,
    }
    Ok(())
}
