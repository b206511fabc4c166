//! Review variants selected by a textual command.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Review style requested for a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVariant {
    /// General review.
    Standard,
    /// Gemini-style deep dive into design and correctness.
    DeepDive,
    Security,
    /// Review focused on concrete improvement suggestions.
    Improvements,
}

/// Command markers, most specific first.
const MARKERS: &[(&str, ReviewVariant)] = &[
    ("/gemini-review", ReviewVariant::DeepDive),
    ("/security-review", ReviewVariant::Security),
    ("/suggest-improvements", ReviewVariant::Improvements),
    ("/review", ReviewVariant::Standard),
];

impl ReviewVariant {
    pub const ALL: [Self; 4] = [
        Self::Standard,
        Self::DeepDive,
        Self::Security,
        Self::Improvements,
    ];

    /// Resolve a review command. Never fails; unknown commands are `Standard`.
    pub fn from_command(command: &str) -> Self {
        let normalized = command.trim().to_lowercase();
        MARKERS
            .iter()
            .find(|(marker, _)| normalized.starts_with(marker))
            .map(|(_, variant)| *variant)
            .unwrap_or(Self::Standard)
    }

    /// Command marker that selects this variant.
    pub fn marker(self) -> &'static str {
        MARKERS
            .iter()
            .find(|(_, variant)| *variant == self)
            .map(|(marker, _)| *marker)
            .unwrap_or("/review")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::DeepDive => "deep_dive",
            Self::Security => "security",
            Self::Improvements => "improvements",
        }
    }
}

impl fmt::Display for ReviewVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
