//! Intent classes for incoming questions.
//!
//! The classifier capability answers with a numeric verdict. This module
//! owns the mapping from verdict text to [`IntentClass`] so the mapping is
//! a pure function that can be tested without a provider.

use serde::{Deserialize, Serialize};

/// Intent of a question. Exactly one per question.
///
/// Discriminants are the wire codes used by the classifier prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentClass {
    /// Question about the dataset itself (coverage, structure, methodology).
    General = 0,
    /// Scores for a single country, sector or period.
    Score = 1,
    /// Explicit visualisation request.
    Graphical = 2,
    /// Comparison across countries, sectors or years.
    Comparative = 3,
    /// Definition or explanation of a term.
    Definition = 4,
    /// Not about the STRI.
    Unrelated = 5,
    /// Broad country or sector overview.
    Summary = 6,
    /// Qualitative reform narrative.
    Reforms = 7,
}

impl IntentClass {
    /// All classes in wire-code order.
    pub const ALL: [Self; 8] = [
        Self::General,
        Self::Score,
        Self::Graphical,
        Self::Comparative,
        Self::Definition,
        Self::Unrelated,
        Self::Summary,
        Self::Reforms,
    ];

    /// Maps a wire code to its class.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::General),
            1 => Some(Self::Score),
            2 => Some(Self::Graphical),
            3 => Some(Self::Comparative),
            4 => Some(Self::Definition),
            5 => Some(Self::Unrelated),
            6 => Some(Self::Summary),
            7 => Some(Self::Reforms),
            _ => None,
        }
    }

    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Rank among overlapping cues; lower wins.
    ///
    /// visualisation > comparison > definition > summary > reforms >
    /// score > dataset-meta > unrelated.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Graphical => 0,
            Self::Comparative => 1,
            Self::Definition => 2,
            Self::Summary => 3,
            Self::Reforms => 4,
            Self::Score => 5,
            Self::General => 6,
            Self::Unrelated => 7,
        }
    }

    /// Parses a classifier verdict.
    ///
    /// The verdict is a list of wire codes separated by commas or
    /// whitespace. When several codes are present the highest-priority one
    /// is returned. Anything else, including an empty verdict, is
    /// [`IntentClass::Unrelated`].
    #[must_use]
    pub fn parse_verdict(verdict: &str) -> Self {
        let mut best: Option<Self> = None;
        for token in verdict
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let Some(class) = token.parse::<u8>().ok().and_then(Self::from_code) else {
                return Self::Unrelated;
            };
            if best.is_none_or(|b| class.priority() < b.priority()) {
                best = Some(class);
            }
        }
        best.unwrap_or(Self::Unrelated)
    }

    /// Returns `true` for branches that run generated programs.
    #[must_use]
    pub const fn is_generic(self) -> bool {
        matches!(
            self,
            Self::General | Self::Score | Self::Graphical | Self::Comparative
        )
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Score => "score",
            Self::Graphical => "graphical",
            Self::Comparative => "comparative",
            Self::Definition => "definition",
            Self::Unrelated => "unrelated",
            Self::Summary => "summary",
            Self::Reforms => "reforms",
        }
    }
}

impl std::fmt::Display for IntentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
