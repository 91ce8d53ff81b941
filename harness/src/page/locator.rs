//! Element locators: a CSS selector refined by text, nesting, scope and index.

use std::fmt;

/// How a text filter compares against an element's text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TextMatch {
    /// Case-insensitive substring, whitespace-normalized.
    Contains(String),
    /// Whole text equals the value after whitespace normalization.
    Exact(String),
}

impl TextMatch {
    fn value(&self) -> &str {
        match self {
            Self::Contains(text) | Self::Exact(text) => text,
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(needle) => normalize(text)
                .to_lowercase()
                .contains(&normalize(needle).to_lowercase()),
            Self::Exact(expected) => normalize(text) == normalize(expected),
        }
    }
}

/// Describes how to find elements on a page.
///
/// Locators are plain values; resolving them is the driver's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    selector: String,
    has_text: Option<TextMatch>,
    has: Option<Box<Locator>>,
    parent: Option<Box<Locator>>,
    nth: Option<usize>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            has_text: None,
            has: None,
            parent: None,
            nth: None,
        }
    }

    /// Keep only matches whose text contains `text` (case-insensitive,
    /// whitespace-normalized).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(TextMatch::Contains(text.into()));
        self
    }

    /// Keep only matches whose whole text is `text`, ignoring surrounding and
    /// repeated whitespace. Use this for resource names.
    pub fn with_exact_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(TextMatch::Exact(text.into()));
        self
    }

    /// Keep only matches that contain an element matching `inner`.
    pub fn has(mut self, inner: Locator) -> Self {
        self.has = Some(Box::new(inner));
        self
    }

    /// Locator for `selector` searched inside the matches of `self`.
    pub fn locator(&self, selector: impl Into<String>) -> Self {
        Self {
            parent: Some(Box::new(self.clone())),
            ..Self::css(selector)
        }
    }

    /// Keep only the match at `index` (0-based).
    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn text_filter(&self) -> Option<&str> {
        self.has_text.as_ref().map(TextMatch::value)
    }

    pub fn has_filter(&self) -> Option<&Locator> {
        self.has.as_deref()
    }

    pub fn parent(&self) -> Option<&Locator> {
        self.parent.as_deref()
    }

    pub fn index(&self) -> Option<usize> {
        self.nth
    }

    /// Whether `text` passes this locator's text filter.
    pub fn matches_text(&self, text: &str) -> bool {
        match &self.has_text {
            None => true,
            Some(filter) => filter.matches(text),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent} >> ")?;
        }
        f.write_str(&self.selector)?;
        match &self.has_text {
            Some(TextMatch::Contains(text)) => write!(f, "[has-text={text:?}]")?,
            Some(TextMatch::Exact(text)) => write!(f, "[text-is={text:?}]")?,
            None => {}
        }
        if let Some(inner) = &self.has {
            write!(f, "[has={inner}]")?;
        }
        if let Some(index) = self.nth {
            write!(f, "[nth={index}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_every_refinement() {
        let card = Locator::css("data-plane-card")
            .has(Locator::css(".data-plane-name").with_text("dp1"));
        let button = card.locator("button").with_text("Go to Data Plane").nth(0);
        assert_eq!(
            button.to_string(),
            "data-plane-card[has=.data-plane-name[has-text=\"dp1\"]] >> button[has-text=\"Go to Data Plane\"][nth=0]"
        );
    }

    #[test]
    fn scoped_locator_keeps_parent() {
        let scope = Locator::css(".register-data-plane");
        let title = scope.locator("p.title");
        assert_eq!(title.parent(), Some(&scope));
        assert_eq!(title.selector(), "p.title");
        assert_eq!(title.index(), None);
    }

    #[test]
    fn text_filter_is_case_and_whitespace_insensitive() {
        let loc = Locator::css("a").with_text("Namespace & Service account");
        assert!(loc.matches_text("  namespace &\n service   ACCOUNT  "));
        assert!(!loc.matches_text("Namespace"));
        assert!(Locator::css("a").matches_text("anything"));
    }

    #[test]
    fn exact_text_does_not_match_longer_names() {
        let dp1 = Locator::css(".data-plane-name").with_exact_text("dp1");
        assert!(dp1.matches_text("dp1"));
        assert!(dp1.matches_text("  dp1\n"));
        assert!(!dp1.matches_text("dp10"));
        assert!(!dp1.matches_text("DP1-prod"));
        assert!(!dp1.matches_text("DP1"));
        assert_eq!(dp1.text_filter(), Some("dp1"));
        assert_eq!(dp1.to_string(), ".data-plane-name[text-is=\"dp1\"]");
    }
}
