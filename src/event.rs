use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One recorded page visit, as stored under the analytics log path.
///
/// Field names follow the stored record layout (`duration`, `timestamp`,
/// `sessionId`). Every field tolerates being absent when read back, so
/// partially written records still aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitEvent {
    #[serde(default)]
    pub page: String,
    /// Whole seconds the view was active.
    #[serde(rename = "duration", default)]
    pub duration_secs: u64,
    /// Epoch milliseconds at view exit.
    #[serde(rename = "timestamp", default)]
    pub timestamp_millis: i64,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    /// Click labels in order; serialized as `null` rather than omitted when
    /// nothing was clicked.
    #[serde(default)]
    pub clicks: Option<Vec<String>>,
}

/// The fixed set of views the site navigates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    About,
    Contact,
    Quote,
    Admin,
    CoreBanking,
    Ssb,
    Custom,
    Chatbots,
    Integration,
    Blog,
}

impl View {
    pub const ALL: [Self; 11] = [
        Self::Home,
        Self::About,
        Self::Contact,
        Self::Quote,
        Self::Admin,
        Self::CoreBanking,
        Self::Ssb,
        Self::Custom,
        Self::Chatbots,
        Self::Integration,
        Self::Blog,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::About => "about",
            Self::Contact => "contact",
            Self::Quote => "quote",
            Self::Admin => "admin",
            Self::CoreBanking => "core-banking",
            Self::Ssb => "ssb",
            Self::Custom => "custom",
            Self::Chatbots => "chatbots",
            Self::Integration => "integration",
            Self::Blog => "blog",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownView(pub String);

impl fmt::Display for UnknownView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown view: {}", self.0)
    }
}

impl std::error::Error for UnknownView {}

impl FromStr for View {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownView(s.to_string()))
    }
}
