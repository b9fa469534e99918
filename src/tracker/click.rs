/// Maximum length, in characters, of a recorded click label.
pub const MAX_LABEL_CHARS: usize = 30;

/// The parts of a DOM element a click label can be derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    /// Rendered text content.
    pub text: Option<String>,
    pub aria_label: Option<String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn with_aria_label(mut self, label: &str) -> Self {
        self.aria_label = Some(label.to_string());
        self
    }

    fn is_interactive(&self) -> bool {
        self.tag.eq_ignore_ascii_case("button") || self.tag.eq_ignore_ascii_case("a")
    }
}

/// A click target together with its ancestors, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickTarget {
    pub path: Vec<Element>,
}

impl ClickTarget {
    pub fn new(path: Vec<Element>) -> Self {
        Self { path }
    }

    /// Nearest button or link at or above the clicked element.
    pub fn closest_interactive(&self) -> Option<&Element> {
        self.path.iter().find(|el| el.is_interactive())
    }

    /// Label to record for this click, if it landed on a button or link.
    pub fn label(&self) -> Option<String> {
        self.closest_interactive().and_then(element_label)
    }
}

/// Visible text, else aria-label, else the upper-cased tag name; trimmed and
/// cut to [`MAX_LABEL_CHARS`]. A label that trims to nothing is dropped.
fn element_label(el: &Element) -> Option<String> {
    let raw = el
        .text
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| el.aria_label.as_deref().filter(|l| !l.is_empty()))
        .map_or_else(|| el.tag.to_ascii_uppercase(), str::to_string);

    let label: String = raw.trim().chars().take(MAX_LABEL_CHARS).collect();
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}
