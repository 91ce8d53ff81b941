//! Run summary printed at the end of a session.

use anyhow::Result;

use crate::core::report_path::{ENV_KEY, Milestone};
use crate::dataplane::create::CREATE_ATTEMPTS_KEY;
use crate::io::config::HarnessConfig;
use crate::io::run_report::RunReport;

const WIDTH: usize = 90;
const LABEL_WIDTH: usize = 28;

/// Record the environment the run targets under `ENV` in the report.
pub fn record_environment(report: &mut RunReport, config: &HarnessConfig) -> Result<()> {
    report.set(&format!("{ENV_KEY}.CONSOLE_URL"), config.console.url.as_str())?;
    report.set(
        &format!("{ENV_KEY}.WEBDRIVER_URL"),
        config.browser.webdriver_url.as_str(),
    )?;
    Ok(())
}

/// Human-readable summary of the environment and every recorded data plane.
pub fn render_summary(config: &HarnessConfig, report: &RunReport) -> String {
    let mut lines = vec!["=".repeat(WIDTH), "-".repeat(WIDTH)];
    lines.push(format!("{:^WIDTH$}", "Console"));
    lines.push("-".repeat(WIDTH));
    lines.push(row("Console URL:", &config.console.url));
    lines.push(row("Report:", &report.path().display().to_string()));

    let dataplanes = report.dataplanes();
    if !dataplanes.is_empty() {
        lines.push("-".repeat(WIDTH));
        lines.push(format!("{:^WIDTH$}", "Data Plane, App"));
        lines.push("-".repeat(WIDTH));
    }
    for dataplane in &dataplanes {
        lines.push(row("DataPlane Name:", dataplane));
        lines.push(row(
            "Tunnel Connected:",
            yes_no(report.is_milestone_set(dataplane, Milestone::TunnelConnected)),
        ));
        if let Some(attempts) = report.get_dataplane_info(dataplane, CREATE_ATTEMPTS_KEY) {
            lines.push(row("Create attempts:", &attempts.to_string()));
        }
        if report.is_milestone_set(dataplane, Milestone::O11yConfig) {
            lines.push(row("DataPlane Configured:", "yes"));
        }

        let capabilities = report.capabilities(dataplane);
        if !capabilities.is_empty() {
            let upper: Vec<String> = capabilities.iter().map(|c| c.to_uppercase()).collect();
            lines.push(row("Provisioned capabilities:", &upper.join(", ")));
        }
        for capability in &capabilities {
            let apps = report.capability_apps(dataplane, capability);
            if apps.is_empty() {
                continue;
            }
            lines.push(capitalize(capability));
            for app in &apps {
                lines.push(row("  App Name:", app));
                if let Some(status) =
                    report.get_capability_app_info(dataplane, capability, app, "status")
                {
                    let status = status
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| status.to_string());
                    lines.push(row("  App Status:", &status));
                }
            }
        }
    }
    lines.push("=".repeat(WIDTH));
    lines.join("\n")
}

fn row(label: &str, value: &str) -> String {
    format!("{label:<LABEL_WIDTH$}{value}")
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn environment_is_recorded_under_env() {
        let fixture = Fixture::new().expect("fixture");
        let mut report = fixture.open_report().expect("report");
        record_environment(&mut report, &fixture.config).expect("record");
        assert_eq!(
            report.get("ENV.CONSOLE_URL").and_then(|v| v.as_str()),
            Some("https://console.test")
        );
    }

    #[test]
    fn summary_lists_dataplanes_capabilities_and_apps() {
        let fixture = Fixture::new().expect("fixture");
        let mut report = fixture.open_report().expect("report");
        report.set_dataplane("dp1").expect("created");
        report
            .set_milestone("dp1", Milestone::TunnelConnected)
            .expect("tunnel");
        report
            .set_dataplane_info("dp1", CREATE_ATTEMPTS_KEY, 2)
            .expect("attempts");
        report
            .set_capability_info("dp1", "bwce", "provisioned", true)
            .expect("capability");
        report
            .set_capability_app_info("dp1", "bwce", "orders", "status", "Running")
            .expect("app");

        let text = render_summary(&fixture.config, &report);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.first().map(|l| l.len()), Some(WIDTH));
        assert!(lines.contains(&format!("{:<28}dp1", "DataPlane Name:").as_str()));
        assert!(lines.contains(&format!("{:<28}yes", "Tunnel Connected:").as_str()));
        assert!(lines.contains(&format!("{:<28}2", "Create attempts:").as_str()));
        assert!(lines.contains(&format!("{:<28}BWCE", "Provisioned capabilities:").as_str()));
        assert!(lines.contains(&"Bwce"));
        assert!(lines.contains(&format!("{:<28}Running", "  App Status:").as_str()));
    }

    #[test]
    fn empty_report_has_no_dataplane_section() {
        let fixture = Fixture::new().expect("fixture");
        let report = fixture.open_report().expect("report");
        let text = render_summary(&fixture.config, &report);
        assert!(!text.contains("Data Plane, App"));
        assert!(text.contains("https://console.test"));
    }
}
