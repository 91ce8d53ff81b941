//! Data plane page object: navigation, capability checks, creation and
//! deletion of data planes in the console.

pub mod commands;
pub mod create;
pub mod selectors;

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::core::naming::capability_card_id;
use crate::core::poll_spec::PollSpec;
use crate::gate::exit_error;
use crate::io::artifacts::ArtifactPaths;
use crate::io::config::HarnessConfig;
use crate::io::run_report::RunReport;
use crate::io::shell::ShellRunner;
use crate::page::{Page, WaitState};
use crate::poll::{poll_visible, refresh_until_visible, wait_for_success_message};

/// Wait for a capability card to show up on the data plane page.
pub const CAPABILITY_POLL: PollSpec = PollSpec::from_secs(10, 120).with_refresh();
/// Timeout for the notification that confirms a deletion.
pub const DELETE_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Orchestrates console actions for data planes.
///
/// Holds the browser page, the runner for downloaded scripts, and the run
/// report every durable milestone is written to.
pub struct DataPlanePage<'a, P: Page, S: ShellRunner> {
    page: &'a P,
    shell: &'a S,
    config: &'a HarnessConfig,
    artifacts: ArtifactPaths,
    report: &'a mut RunReport,
}

impl<'a, P: Page, S: ShellRunner> DataPlanePage<'a, P, S> {
    pub fn new(
        page: &'a P,
        shell: &'a S,
        config: &'a HarnessConfig,
        report: &'a mut RunReport,
    ) -> Self {
        Self {
            page,
            shell,
            config,
            artifacts: ArtifactPaths::from_config(config),
            report,
        }
    }

    pub fn report(&self) -> &RunReport {
        &*self.report
    }

    fn fatal(&self, message: impl Into<String>, context: &str) -> anyhow::Error {
        exit_error(self.page, &self.artifacts, message, context)
    }

    /// Click an entry of the left side menu.
    pub fn goto_left_navbar(&self, item: &str) -> Result<()> {
        info!(item, "going to left side menu");
        let entry = selectors::nav_item(item);
        self.page.wait_for(&entry, WaitState::Visible)?;
        self.page.click(&entry)?;
        self.page.pause(Duration::from_millis(500));
        Ok(())
    }

    /// Open the data plane list and wait for it to render.
    pub fn goto_left_navbar_dataplane(&self) -> Result<()> {
        self.goto_left_navbar(selectors::DATA_PLANES_NAV)?;
        self.page
            .wait_for(&selectors::dataplanes_content(), WaitState::Visible)?;
        Ok(())
    }

    /// Open the global data plane configuration page.
    pub fn goto_global_dataplane(&self) -> Result<()> {
        info!("going to global data plane configuration");
        self.page.click(&selectors::dataplanes_menu())?;
        self.page.pause(Duration::from_secs(1));
        self.page.click(&selectors::global_configuration_button())?;
        self.page.wait_for(
            &selectors::global_configuration_breadcrumb(),
            WaitState::Visible,
        )?;
        info!(outcome = "success", "navigated to global data plane configuration");
        Ok(())
    }

    /// Open the detail page of `dataplane`. Fatal if it is not listed or its
    /// detail page never renders.
    pub fn goto_dataplane(&self, dataplane: &str) -> Result<()> {
        info!(dataplane, "going to data plane");
        self.page.click(&selectors::dataplanes_menu())?;
        self.page.pause(Duration::from_secs(2));

        let listed = refresh_until_visible(
            self.page,
            &selectors::dataplane_name(dataplane),
            &selectors::dataplanes_content(),
            "data plane list",
        );
        if !listed {
            return Err(self.fatal(
                format!("DataPlane {dataplane} does not exist"),
                "goto_dataplane",
            ));
        }

        self.page
            .click(&selectors::go_to_dataplane_button(dataplane))?;
        self.page.pause(Duration::from_secs(2));

        let title = selectors::dataplane_detail_title(dataplane);
        if !refresh_until_visible(self.page, &title, &title, "data plane detail") {
            return Err(self.fatal(
                format!("DataPlane {dataplane} detail page is not load."),
                "goto_dataplane",
            ));
        }
        info!(dataplane, outcome = "success", "navigated to data plane detail page");
        self.page.pause(Duration::from_secs(1));
        Ok(())
    }

    /// Open the detail page of `capability` on `dataplane`.
    ///
    /// With `require_ready`, a provisioned capability whose status is not
    /// ready is fatal.
    pub fn goto_capability(
        &self,
        dataplane: &str,
        capability: &str,
        require_ready: bool,
    ) -> Result<()> {
        info!(dataplane, capability, "going to capability");
        self.goto_dataplane(dataplane)?;
        let context = format!("{}_goto_capability", capability_card_id(capability));

        if !poll_visible(
            self.page,
            &selectors::capability_card(capability),
            &CAPABILITY_POLL,
        ) {
            return Err(self.fatal(
                format!("{capability} capability is not provisioned yet."),
                &context,
            ));
        }

        let ready = self
            .page
            .is_visible(&selectors::capability_ready(capability))
            .unwrap_or(false);
        if require_ready && !ready {
            return Err(self.fatal(
                format!("{capability} capability is provisioned, but status is not ready."),
                &context,
            ));
        }
        if !require_ready {
            info!(capability, ready, "ignoring capability status");
        }

        self.page.click(&selectors::capability_open(capability))?;
        self.page.pause(Duration::from_secs(3));

        let detail = selectors::capability_detail();
        if !refresh_until_visible(self.page, &detail, &detail, "capability detail") {
            return Err(self.fatal(
                format!("{capability} capability page is not loaded."),
                &context,
            ));
        }
        info!(capability, outcome = "success", "navigated to capability detail page");
        self.page.pause(Duration::from_secs(1));
        Ok(())
    }

    /// Open the detail page of a deployed app.
    pub fn goto_app_detail(&self, dataplane: &str, app: &str) -> Result<()> {
        info!(dataplane, app, "going to app detail page");
        self.goto_dataplane(dataplane)?;

        let link = selectors::app_link(app);
        if !refresh_until_visible(self.page, &link, &link, "app list") {
            return Err(self.fatal(
                format!("The app '{app}' is not deployed yet."),
                "goto_app_detail",
            ));
        }
        self.page.click(&link)?;
        self.page
            .wait_for(&selectors::app_detail_title(app), WaitState::Visible)?;
        info!(app, outcome = "success", "navigated to app detail page");
        self.page.pause(Duration::from_millis(500));
        Ok(())
    }

    /// Probe whether `capability` (optionally the instance named `name`) is
    /// provisioned on the current data plane page. Never fails.
    pub fn is_capability_provisioned(&self, capability: &str, name: Option<&str>) -> bool {
        info!(capability, "checking whether capability is provisioned");
        match self.probe_capability(capability, name) {
            Ok(provisioned) => provisioned,
            Err(err) => {
                warn!(capability, error = %err, "capability check failed");
                false
            }
        }
    }

    fn probe_capability(&self, capability: &str, name: Option<&str>) -> Result<bool> {
        self.page.pause(Duration::from_secs(3));
        if !self
            .page
            .is_visible(&selectors::capability_card(capability))?
        {
            warn!(capability, "capability has not been provisioned");
            return Ok(false);
        }
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            info!(capability, outcome = "success", "capability is provisioned");
            return Ok(true);
        };
        let named = self
            .page
            .is_visible(&selectors::capability_instance(capability, name))?;
        if named {
            info!(capability, name, outcome = "success", "capability instance is provisioned");
        } else {
            warn!(capability, name, "capability instance has not been provisioned");
        }
        Ok(named)
    }

    /// Delete `dataplane` from the console and retract its run report record.
    ///
    /// Returns whether a deletion was confirmed. A data plane that is not
    /// listed is not an error; any stale record of it is dropped.
    pub fn delete_dataplane(&mut self, dataplane: &str) -> Result<bool> {
        info!(dataplane, "deleting data plane");
        self.goto_left_navbar_dataplane()?;

        let name = selectors::dataplane_name(dataplane);
        if !refresh_until_visible(
            self.page,
            &name,
            &selectors::dataplanes_content(),
            "data plane list",
        ) {
            info!(dataplane, "data plane not listed, nothing to delete");
            if self.report.remove_dataplane(dataplane)? {
                info!(dataplane, "dropped stale data plane record");
            }
            return Ok(false);
        }

        self.page
            .click(&selectors::delete_menu_button(dataplane))?;
        let action = selectors::delete_menu_action();
        self.page.wait_for(&action, WaitState::Visible)?;
        self.page.click(&action)?;
        self.page
            .wait_for(&selectors::delete_modal(), WaitState::Visible)?;
        self.page.click(&selectors::delete_confirm())?;

        if !wait_for_success_message(self.page, DELETE_MESSAGE_TIMEOUT) {
            warn!(dataplane, "deletion was not confirmed by the console");
            return Ok(false);
        }
        self.page.wait_for(&name, WaitState::Detached)?;
        self.report.remove_dataplane(dataplane)?;
        info!(dataplane, outcome = "success", "deleted data plane");
        Ok(true)
    }
}
