//! Registration commands: download each generated script and run it.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use super::{DataPlanePage, selectors};
use crate::core::naming::command_file_name;
use crate::io::shell::{ScriptOutcome, ScriptRequest, ShellRunner};
use crate::page::Page;

impl<P: Page, S: ShellRunner> DataPlanePage<'_, P, S> {
    /// Download and run every command the registration page lists, in page
    /// order. Returns the number of commands run.
    ///
    /// The count is discovered from the rendered step titles. A command that
    /// does not succeed aborts the run.
    pub fn run_registration_commands(&self, dataplane: &str) -> Result<usize> {
        let titles = self.page.all_text_contents(&selectors::command_titles())?;
        info!(dataplane, steps = titles.len(), "running registration commands");

        for (index, title) in titles.iter().enumerate() {
            let title = title.trim();
            info!(step = index + 1, title, "downloading command");
            let script = self
                .artifacts
                .command_file_path(&command_file_name(dataplane, index))?;
            self.page
                .download(&selectors::download_command(index), &script)?;

            info!(step = index + 1, title, script = %script.display(), "running command");
            let outcome = self
                .shell
                .run(&ScriptRequest::for_script(&script, &self.config.commands))?;
            if outcome != ScriptOutcome::Succeeded {
                return Err(self.fatal(
                    format!("Command for step '{title}' of DataPlane {dataplane} {outcome}."),
                    &format!("{dataplane}_run_command_{}", index + 1),
                ));
            }
            self.page
                .pause(Duration::from_secs(self.config.commands.settle_secs));
        }
        Ok(titles.len())
    }
}
