//! Self-retrying data plane creation.
//!
//! One call walks the registration wizard, waits for the console to accept
//! the registration, runs the generated commands and waits for the tunnel.
//! A registration that never shows up is cleaned up and retried from the
//! start, up to `dataplane.max_create_attempts` times.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use super::{DataPlanePage, selectors};
use crate::core::naming::validate_resource_name;
use crate::core::poll_spec::PollSpec;
use crate::core::report_path::Milestone;
use crate::core::retry::{RetryContext, RetryDecision};
use crate::core::wizard::CreationStage;
use crate::gate::warning_screenshot;
use crate::io::shell::ShellRunner;
use crate::page::{Page, WaitState};
use crate::poll::poll_visible;

/// Wait for the registration page after the wizard.
pub const REGISTRATION_POLL: PollSpec = PollSpec::from_secs(3, 45);
/// Wait for the optional preview step.
pub const PREVIEW_POLL: PollSpec = PollSpec::from_secs(3, 9);
/// Wait for the data plane's tunnel to connect.
pub const TUNNEL_POLL: PollSpec = PollSpec::from_secs(10, 180).with_refresh();
/// Data plane record key holding the attempt that registered it.
pub const CREATE_ATTEMPTS_KEY: &str = "createAttempts";

/// How one registration attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The data plane was already listed; nothing was submitted.
    AlreadyExists,
    /// The console shows the registration commands.
    Ready,
    /// The registration page never appeared.
    Stalled,
}

/// How [`DataPlanePage::create_dataplane`] completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The run report already marks the data plane created; no browser action
    /// was taken.
    AlreadyRecorded,
    /// The data plane was listed in the console but not recorded; it was
    /// recorded and its tunnel awaited.
    Adopted,
    Created { attempts: u32, commands: usize },
}

impl<P: Page, S: ShellRunner> DataPlanePage<'_, P, S> {
    /// Create `dataplane` unless the run report already records it.
    pub fn create_dataplane(&mut self, dataplane: &str) -> Result<CreateOutcome> {
        validate_resource_name(dataplane)?;
        if self.report.is_dataplane_created(dataplane) {
            info!(
                dataplane,
                report = %self.report.path().display(),
                "data plane already recorded as created"
            );
            return Ok(CreateOutcome::AlreadyRecorded);
        }

        let mut retry =
            RetryContext::new(dataplane, self.config.dataplane.max_create_attempts);
        loop {
            info!(
                dataplane,
                attempt = retry.attempt,
                max_attempts = retry.max_attempts,
                final_attempt = retry.is_final_attempt(),
                stage = %CreationStage::Start,
                "creating data plane"
            );
            match self.attempt_registration(dataplane)? {
                RegistrationOutcome::AlreadyExists => {
                    self.wait_tunnel_connected(dataplane)?;
                    return Ok(CreateOutcome::Adopted);
                }
                RegistrationOutcome::Ready => break,
                RegistrationOutcome::Stalled => {
                    warning_screenshot(
                        self.page,
                        &self.artifacts,
                        &format!("{dataplane}_registration_attempt_{}", retry.attempt),
                    );
                    info!(dataplane, stage = %CreationStage::CleanupAndRetry, "cleaning up");
                    if let Err(err) = self.delete_dataplane(dataplane) {
                        warn!(dataplane, error = %err, "cleanup of failed registration failed");
                    }
                    match retry.on_failure() {
                        RetryDecision::Retry { next_attempt } => warn!(
                            resource = %retry.resource_name,
                            next_attempt,
                            max_attempts = retry.max_attempts,
                            "data plane creation failed, retrying"
                        ),
                        RetryDecision::Exhausted => {
                            return Err(self.fatal(
                                format!("Data Plane '{dataplane}' creation failed."),
                                "k8s_create_dataplane_finish",
                            ));
                        }
                    }
                }
            }
        }

        info!(dataplane, stage = %CreationStage::RunCommands, "registration accepted");
        let commands = self.run_registration_commands(dataplane)?;
        self.finish_registration(dataplane)?;
        self.report
            .set_dataplane_info(dataplane, CREATE_ATTEMPTS_KEY, retry.attempt)?;
        self.wait_tunnel_connected(dataplane)?;
        info!(dataplane, stage = %CreationStage::Done, outcome = "success", "data plane created");
        Ok(CreateOutcome::Created {
            attempts: retry.attempt,
            commands,
        })
    }

    /// One pass from the data plane list through the wizard to the
    /// registration page.
    fn attempt_registration(&mut self, dataplane: &str) -> Result<RegistrationOutcome> {
        self.goto_left_navbar_dataplane()?;
        self.page.pause(Duration::from_secs(2));

        let listed = self.page.count(&selectors::all_dataplane_names())?;
        let max = self.config.dataplane.max_data_planes as usize;
        if listed > max {
            return Err(self.fatal(
                "Too many data planes, please delete some data planes first.",
                "k8s_create_dataplane",
            ));
        }

        if self
            .page
            .is_visible(&selectors::dataplane_name(dataplane))
            .unwrap_or(false)
        {
            self.report.set_dataplane(dataplane)?;
            info!(dataplane, outcome = "success", "data plane already exists in the console");
            return Ok(RegistrationOutcome::AlreadyExists);
        }

        if let Err(err) = self.fill_wizard(dataplane) {
            warn!(dataplane, error = %err, "registration wizard did not complete");
        }

        info!(dataplane, stage = %CreationStage::AwaitRegistration, "waiting for registration");
        if poll_visible(self.page, &selectors::registration_content(), &REGISTRATION_POLL) {
            Ok(RegistrationOutcome::Ready)
        } else {
            Ok(RegistrationOutcome::Stalled)
        }
    }

    fn fill_wizard(&self, dataplane: &str) -> Result<()> {
        self.page.click(&selectors::register_button())?;
        let existing = selectors::select_existing_button();
        self.page.wait_for(&existing, WaitState::Visible)?;
        self.page.click(&existing)?;

        self.await_wizard_step(CreationStage::BasicInfo)?;
        self.page.fill(&selectors::name_input(), dataplane)?;
        self.page.click(&selectors::eua_checkbox())?;
        self.page.click(&selectors::basics_next())?;

        self.await_wizard_step(CreationStage::NamespaceConfig)?;
        let dp = &self.config.dataplane;
        self.page.fill(&selectors::namespace_input(), &dp.namespace)?;
        self.page
            .fill(&selectors::service_account_input(), &dp.service_account)?;
        self.page.click(&selectors::namespace_next())?;

        self.await_wizard_step(CreationStage::ReviewConfig)?;
        self.page.click(&selectors::config_next())?;

        // Only newer consoles show a preview step.
        if let Some(preview) = selectors::wizard_step(CreationStage::Preview)
            && poll_visible(self.page, &preview, &PREVIEW_POLL)
        {
            info!(stage = %CreationStage::Preview, "wizard step loaded");
            self.page.pause(Duration::from_secs(1));
            let next = selectors::preview_next();
            if self.page.is_visible(&next)? {
                self.page.click(&next)?;
            }
        }
        Ok(())
    }

    fn await_wizard_step(&self, stage: CreationStage) -> Result<()> {
        if let Some(step) = selectors::wizard_step(stage) {
            self.page.wait_for(&step, WaitState::Visible)?;
            info!(%stage, "wizard step loaded");
        }
        Ok(())
    }

    /// Close the registration page and confirm.
    fn finish_registration(&mut self, dataplane: &str) -> Result<()> {
        self.page.click(&selectors::finish_button())?;
        let yes = selectors::confirm_yes();
        self.page.wait_for(&yes, WaitState::Visible)?;
        self.page.click(&yes)?;
        self.report
            .set_milestone(dataplane, Milestone::RunCommands)?;
        info!(dataplane, "registration finished");
        self.page.pause(Duration::from_secs(2));
        Ok(())
    }

    /// Wait for `dataplane` to be listed and for its tunnel to connect.
    /// Both are fatal when they do not happen.
    pub fn wait_tunnel_connected(&mut self, dataplane: &str) -> Result<()> {
        info!(dataplane, stage = %CreationStage::AwaitTunnel, "waiting for tunnel");
        self.goto_left_navbar_dataplane()?;

        if let Err(err) = self
            .page
            .wait_for(&selectors::dataplane_name(dataplane), WaitState::Visible)
        {
            warn!(dataplane, error = %err, "data plane not listed");
            return Err(self.fatal(
                format!("DataPlane {dataplane} is not created."),
                "k8s_wait_tunnel_connected_1",
            ));
        }
        self.report.set_dataplane(dataplane)?;
        info!(dataplane, outcome = "success", "data plane is created, waiting for tunnel");

        if !poll_visible(
            self.page,
            &selectors::tunnel_connected(dataplane),
            &TUNNEL_POLL,
        ) {
            return Err(self.fatal(
                format!(
                    "DataPlane {dataplane} tunnel is not connected, exit program and recheck again."
                ),
                "k8s_wait_tunnel_connected_2",
            ));
        }
        self.report
            .set_milestone(dataplane, Milestone::TunnelConnected)?;
        info!(dataplane, outcome = "success", "tunnel is connected");
        Ok(())
    }
}
