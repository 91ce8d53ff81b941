//! Deterministic names for run artifacts and console ids.

use anyhow::{Result, anyhow};

/// File name for the downloaded command of a registration step.
///
/// `step_index` is the 0-based position of the step on the page; names are
/// 1-based: `{resource}_{step_index + 1}.sh`.
pub fn command_file_name(resource: &str, step_index: usize) -> String {
    format!("{resource}_{}.sh", step_index + 1)
}

/// Screenshot name captured when a run aborts.
pub fn error_screenshot_name(context: &str) -> String {
    format!("error-{}.png", strip_png(context))
}

/// Screenshot name captured for a non-fatal diagnostic.
pub fn warning_screenshot_name(context: &str) -> String {
    format!("warning-{}.png", strip_png(context))
}

/// Element id of a capability card in the console.
pub fn capability_card_id(capability: &str) -> String {
    capability.to_lowercase()
}

/// Validate that a resource name is safe for use in artifact file names.
pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("resource name must not be empty"));
    }
    if name
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
    {
        return Err(anyhow!(
            "resource name must be [A-Za-z0-9._-] only (got '{name}')"
        ));
    }
    if name.starts_with('.') {
        return Err(anyhow!("resource name must not start with '.' (got '{name}')"));
    }
    Ok(())
}

fn strip_png(context: &str) -> &str {
    context.strip_suffix(".png").unwrap_or(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_files_are_one_based() {
        assert_eq!(command_file_name("dp1", 0), "dp1_1.sh");
        assert_eq!(command_file_name("dp1", 4), "dp1_5.sh");
    }

    #[test]
    fn screenshot_names_do_not_double_the_extension() {
        assert_eq!(error_screenshot_name("goto_dataplane"), "error-goto_dataplane.png");
        assert_eq!(
            error_screenshot_name("goto_dataplane.png"),
            "error-goto_dataplane.png"
        );
        assert_eq!(warning_screenshot_name("delete"), "warning-delete.png");
    }

    #[test]
    fn resource_names_reject_path_characters() {
        assert!(validate_resource_name("dp-1.test_a").is_ok());
        assert!(validate_resource_name("").is_err());
        assert!(validate_resource_name("../etc").is_err());
        assert!(validate_resource_name("a/b").is_err());
        assert!(validate_resource_name("has space").is_err());
    }

    #[test]
    fn capability_ids_are_lowercased() {
        assert_eq!(capability_card_id("BWCE"), "bwce");
    }
}
