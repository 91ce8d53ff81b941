//! Console element locators used by the data plane workflows.

use crate::core::naming::capability_card_id;
use crate::core::wizard::CreationStage;
use crate::page::Locator;

pub const DATA_PLANES_NAV: &str = "Data Planes";

pub fn nav_item(name: &str) -> Locator {
    Locator::css(".nav-bar-pointer").with_text(name)
}

pub fn dataplanes_menu() -> Locator {
    Locator::css("#nav-bar-menu-list-dataPlanes")
}

/// Marker of a rendered data plane list.
pub fn dataplanes_content() -> Locator {
    Locator::css(".data-planes-content")
}

/// Every data plane name on the list page.
pub fn all_dataplane_names() -> Locator {
    Locator::css(".data-plane-name")
}

pub fn dataplane_name(dataplane: &str) -> Locator {
    all_dataplane_names().with_exact_text(dataplane)
}

pub fn dataplane_card(dataplane: &str) -> Locator {
    Locator::css("data-plane-card").has(dataplane_name(dataplane))
}

pub fn go_to_dataplane_button(dataplane: &str) -> Locator {
    dataplane_card(dataplane)
        .locator("button")
        .with_text("Go to Data Plane")
}

pub fn dataplane_detail_title(dataplane: &str) -> Locator {
    Locator::css(".domain-data-title").with_exact_text(dataplane)
}

pub fn tunnel_connected(dataplane: &str) -> Locator {
    dataplane_card(dataplane).locator(".tunnel-status svg.green")
}

pub fn capability_card(capability: &str) -> Locator {
    Locator::css(format!("capability-card #{}", capability_card_id(capability)))
}

pub fn capability_ready(capability: &str) -> Locator {
    Locator::css(format!(
        "capability-card #{} .status .success",
        capability_card_id(capability)
    ))
}

/// Capability card entry carrying the provisioned instance name.
pub fn capability_instance(capability: &str, name: &str) -> Locator {
    Locator::css(format!(
        "capability-card #{} .pl-tooltip__trigger",
        capability_card_id(capability)
    ))
    .with_text(name)
}

pub fn capability_open(capability: &str) -> Locator {
    Locator::css(format!(
        "capability-card #{} .image-name",
        capability_card_id(capability)
    ))
}

pub fn capability_detail() -> Locator {
    Locator::css(".capability-connectors-container .total-capability")
}

pub fn app_link(app: &str) -> Locator {
    Locator::css("apps-list td.app-name a").with_exact_text(app)
}

pub fn app_detail_title(app: &str) -> Locator {
    Locator::css(".app-name-section .name").with_exact_text(app)
}

/// Active entry of the registration wizard's step navigation, if `stage` is
/// a wizard page.
pub fn wizard_step(stage: CreationStage) -> Option<Locator> {
    stage
        .wizard_title()
        .map(|title| Locator::css(".pl-secondarynav a.is-active").with_text(title))
}

pub fn register_button() -> Locator {
    Locator::css("#register-dp-button")
}

pub fn select_existing_button() -> Locator {
    Locator::css("#select-existing-dp-button")
}

pub fn name_input() -> Locator {
    Locator::css("#data-plane-name-text-input")
}

pub fn eua_checkbox() -> Locator {
    Locator::css(r#"label[for="eua-checkbox"]"#)
}

pub fn basics_next() -> Locator {
    Locator::css("#data-plane-basics-btn")
}

pub fn namespace_input() -> Locator {
    Locator::css("#namespace-text-input")
}

pub fn service_account_input() -> Locator {
    Locator::css("#service-account-text-input")
}

pub fn namespace_next() -> Locator {
    Locator::css("#data-plane-namespace-btn")
}

pub fn config_next() -> Locator {
    Locator::css("#data-plane-config-btn")
}

pub fn preview_next() -> Locator {
    Locator::css("#data-plane-preview-btn")
}

pub fn registration_content() -> Locator {
    Locator::css(".register-data-plane-content")
}

pub fn command_titles() -> Locator {
    Locator::css(".register-data-plane p.title")
}

pub fn download_command(index: usize) -> Locator {
    Locator::css("#download-commands").nth(index)
}

pub fn finish_button() -> Locator {
    Locator::css("#data-plane-finished-btn")
}

pub fn confirm_yes() -> Locator {
    Locator::css("#confirm-button").with_text("Yes")
}

pub fn delete_menu_button(dataplane: &str) -> Locator {
    dataplane_card(dataplane)
        .locator(".delete-dp-dropdown button")
        .nth(0)
}

pub fn delete_menu_action() -> Locator {
    Locator::css(".is-shown .pl-dropdown-menu__action")
        .with_text("Delete Data Plane")
        .nth(0)
}

pub fn delete_modal() -> Locator {
    Locator::css(".delete-dp-modal")
}

pub fn delete_confirm() -> Locator {
    Locator::css(".delete-dp-modal #confirm-button")
}

pub fn global_configuration_button() -> Locator {
    Locator::css(".global-configuration button")
}

pub fn global_configuration_breadcrumb() -> Locator {
    Locator::css(".global-configuration breadcrumbs a").with_text("Global configuration")
}
