//! Data plane creation workflow tests.
//!
//! Drive `create_dataplane` against a scripted page and a recording shell to
//! check the entry, quota and existence guards, the bounded cleanup-and-retry
//! loop, and the ordered execution of generated registration commands.

use harness::command::{BrowserCommand, execute};
use harness::core::report_path::Milestone;
use harness::dataplane::DataPlanePage;
use harness::dataplane::create::{CREATE_ATTEMPTS_KEY, CreateOutcome};
use harness::dataplane::selectors;
use harness::exit_codes;
use harness::gate::{FatalError, exit_code, is_fatal};
use harness::io::run_report::RunReport;
use harness::io::shell::ScriptOutcome;
use harness::test_support::{Fixture, RecordingShell, ScriptedPage};

#[test]
fn recorded_dataplane_is_not_touched_again() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    report.set_dataplane("dp1").expect("record");
    let page = ScriptedPage::new();
    let shell = RecordingShell::new();

    let outcome = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .expect("create");

    assert_eq!(outcome, CreateOutcome::AlreadyRecorded);
    assert!(page.actions().is_empty());
    assert!(shell.runs().is_empty());
}

/// Registration never appears: every attempt is cleaned up, and the third
/// failure aborts the run.
#[test]
fn stalled_registration_is_cleaned_up_three_times_then_fatal() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    // Each attempt: not listed before the wizard, listed again at cleanup.
    let page = ScriptedPage::new().with_visibility_sequence(
        &selectors::dataplane_name("dp1"),
        vec![false, true, false, true, false, true],
    );
    let shell = RecordingShell::new();

    let result = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .map(|_| ());

    let err = result.as_ref().expect_err("creation must fail");
    assert!(is_fatal(err));
    assert_eq!(err.to_string(), "Data Plane 'dp1' creation failed.");
    assert_eq!(page.clicks_on(&selectors::register_button()), 3);
    assert_eq!(page.clicks_on(&selectors::delete_confirm()), 3);
    assert!(shell.runs().is_empty());
    let warnings: Vec<_> = page
        .screenshots()
        .into_iter()
        .filter(|p| p.to_string_lossy().contains("warning-dp1_registration_attempt_"))
        .collect();
    assert_eq!(warnings.len(), 3);

    let fatal = err.downcast_ref::<FatalError>().expect("fatal");
    let screenshot = fatal.screenshot.clone().expect("screenshot");
    assert!(screenshot.ends_with("error-k8s_create_dataplane_finish.png"));
    assert!(screenshot.exists());
    assert_eq!(exit_code(&result), exit_codes::FATAL);
}

#[test]
fn commands_run_in_page_order_and_milestones_are_persisted() {
    let fixture = Fixture::new().expect("fixture");
    let artifacts = fixture.artifacts();
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new()
        .with_visibility_sequence(&selectors::dataplane_name("dp1"), vec![false, true])
        .with_visible(&selectors::registration_content(), true)
        .with_visible(&selectors::tunnel_connected("dp1"), true)
        .with_texts(
            &selectors::command_titles(),
            &["Create namespace", "Bind service account", "Install agent"],
        );
    let shell = RecordingShell::new();

    let outcome = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .expect("create");

    assert_eq!(
        outcome,
        CreateOutcome::Created {
            attempts: 1,
            commands: 3
        }
    );
    assert_eq!(shell.run_names(), vec!["dp1_1.sh", "dp1_2.sh", "dp1_3.sh"]);
    let downloads = page.downloads();
    let triggers: Vec<&str> = downloads.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
        triggers,
        vec![
            "#download-commands[nth=0]",
            "#download-commands[nth=1]",
            "#download-commands[nth=2]"
        ]
    );
    for (_, dest) in &downloads {
        assert!(dest.starts_with(&artifacts.commands_dir));
        assert!(dest.exists());
    }
    assert_eq!(page.clicks_on(&selectors::confirm_yes()), 1);

    let reopened = RunReport::open(&artifacts.report_path).expect("reopen");
    assert!(reopened.is_dataplane_created("dp1"));
    assert!(reopened.is_milestone_set("dp1", Milestone::RunCommands));
    assert!(reopened.is_milestone_set("dp1", Milestone::TunnelConnected));
    assert_eq!(
        reopened.get_dataplane_info("dp1", CREATE_ATTEMPTS_KEY),
        Some(&serde_json::Value::from(1))
    );
}

#[test]
fn too_many_dataplanes_aborts_before_registering() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new().with_count(&selectors::all_dataplane_names(), 51);
    let shell = RecordingShell::new();

    let err = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .expect_err("quota exceeded");

    assert!(is_fatal(&err));
    assert_eq!(
        err.to_string(),
        "Too many data planes, please delete some data planes first."
    );
    assert_eq!(page.clicks_on(&selectors::register_button()), 0);
    assert!(
        fixture
            .artifacts()
            .screenshots_dir
            .join("error-k8s_create_dataplane.png")
            .exists()
    );
}

#[test]
fn quota_allows_exactly_the_maximum() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new()
        .with_count(&selectors::all_dataplane_names(), 50)
        .with_visible(&selectors::dataplane_name("dp1"), true)
        .with_visible(&selectors::tunnel_connected("dp1"), true);
    let shell = RecordingShell::new();

    let outcome = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .expect("create");

    assert_eq!(outcome, CreateOutcome::Adopted);
}

#[test]
fn listed_dataplane_is_recorded_and_only_awaits_tunnel() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new()
        .with_visible(&selectors::dataplane_name("dp1"), true)
        .with_visible(&selectors::tunnel_connected("dp1"), true);
    let shell = RecordingShell::new();

    let outcome = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .expect("create");

    assert_eq!(outcome, CreateOutcome::Adopted);
    assert_eq!(page.clicks_on(&selectors::register_button()), 0);
    assert!(shell.runs().is_empty());
    assert!(report.is_dataplane_created("dp1"));
    assert!(report.is_milestone_set("dp1", Milestone::TunnelConnected));
    assert!(!report.is_milestone_set("dp1", Milestone::RunCommands));
}

#[test]
fn stuck_tunnel_is_fatal_without_retrying_creation() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new()
        .with_visibility_sequence(&selectors::dataplane_name("dp1"), vec![false, true])
        .with_visible(&selectors::registration_content(), true)
        .with_texts(&selectors::command_titles(), &["Install"]);
    let shell = RecordingShell::new();

    let err = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .expect_err("tunnel never connects");

    assert!(is_fatal(&err));
    assert_eq!(
        err.to_string(),
        "DataPlane dp1 tunnel is not connected, exit program and recheck again."
    );
    assert_eq!(page.clicks_on(&selectors::register_button()), 1);
    assert_eq!(page.clicks_on(&selectors::delete_confirm()), 0);
    // 18 checks with a reload between each pair.
    assert_eq!(page.visibility_checks(&selectors::tunnel_connected("dp1")), 18);
    assert_eq!(page.reloads(), 17);
    assert!(report.is_dataplane_created("dp1"));
    assert!(report.is_milestone_set("dp1", Milestone::RunCommands));
    assert!(!report.is_milestone_set("dp1", Milestone::TunnelConnected));
}

#[test]
fn failing_command_aborts_the_run() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new()
        .with_visible(&selectors::registration_content(), true)
        .with_texts(&selectors::command_titles(), &["Create namespace", "Install"]);
    let shell = RecordingShell::with_outcome(ScriptOutcome::Failed { code: Some(2) });

    let err = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("dp1")
        .expect_err("script fails");

    assert!(is_fatal(&err));
    assert_eq!(shell.run_names(), vec!["dp1_1.sh"]);
    assert_eq!(page.clicks_on(&selectors::finish_button()), 0);
    assert!(!report.is_milestone_set("dp1", Milestone::RunCommands));
}

/// A driver error halfway through the commands still goes through the exit
/// gate and leaves a screenshot behind.
#[test]
fn missing_download_trigger_is_fatal_with_a_screenshot() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new()
        .with_visible(&selectors::registration_content(), true)
        .with_texts(&selectors::command_titles(), &["Create namespace", "Install"])
        .with_absent(&selectors::download_command(1));
    let shell = RecordingShell::new();

    let err = execute(
        &page,
        &shell,
        &fixture.config,
        &mut report,
        BrowserCommand::CreateDataplane {
            name: "dp1".to_string(),
        },
    )
    .expect_err("second download fails");

    assert!(is_fatal(&err));
    assert!(err.to_string().contains("#download-commands[nth=1]"));
    assert_eq!(shell.run_names(), vec!["dp1_1.sh"]);
    let fatal = err.downcast_ref::<FatalError>().expect("fatal");
    let expected = fixture
        .artifacts()
        .screenshots_dir
        .join("error-create_dataplane.png");
    assert_eq!(fatal.screenshot.as_ref(), Some(&expected));
    assert!(expected.exists());
    assert!(!report.is_milestone_set("dp1", Milestone::RunCommands));
}

#[test]
fn unsafe_names_are_rejected_before_any_browser_action() {
    let fixture = Fixture::new().expect("fixture");
    let mut report = fixture.open_report().expect("report");
    let page = ScriptedPage::new();
    let shell = RecordingShell::new();

    let err = DataPlanePage::new(&page, &shell, &fixture.config, &mut report)
        .create_dataplane("../dp1")
        .expect_err("invalid name");

    assert!(!is_fatal(&err));
    assert!(page.actions().is_empty());
}
