//! Name normalization and matching policy
//!
//! Roster names and community display labels are compared through a
//! comparison key rather than raw text. A [`MatchPolicy`] fixes which keys are
//! built and in which order they are tried; the same policy must be applied to
//! both sides of every comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical comparison key: whitespace removed, case folded.
///
/// Total: the empty string maps to the empty string.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Stricter key that also folds accents (`Zoë` and `Zoe` compare equal).
pub fn normalize_strict(raw: &str) -> String {
    let folded: String = raw.chars().flat_map(char::to_lowercase).collect();
    folded
        .nfd()
        .filter(|c| !is_combining_mark(*c) && !c.is_whitespace())
        .collect()
}

/// One way of deriving a comparison key from a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Normalized form of the name as written
    Exact,
    /// Underscores read as spaces before normalizing
    UnderscoreSpace,
    /// Trimmed and lower-cased, whitespace kept
    RawCaseInsensitive,
}

/// Normalization policy used for matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Single pass over [`normalize`]d names
    #[default]
    Simple,
    /// Accent folding plus the underscore and raw fallback passes
    Strict,
}

const SIMPLE_STRATEGIES: &[MatchStrategy] = &[MatchStrategy::Exact];
const STRICT_STRATEGIES: &[MatchStrategy] = &[
    MatchStrategy::Exact,
    MatchStrategy::UnderscoreSpace,
    MatchStrategy::RawCaseInsensitive,
];

impl MatchPolicy {
    /// Strategies in the order they are tried
    pub fn strategies(&self) -> &'static [MatchStrategy] {
        match self {
            Self::Simple => SIMPLE_STRATEGIES,
            Self::Strict => STRICT_STRATEGIES,
        }
    }

    /// Comparison key of `raw` under one strategy of this policy
    pub fn key(&self, strategy: MatchStrategy, raw: &str) -> String {
        match strategy {
            MatchStrategy::Exact => self.base(raw),
            MatchStrategy::UnderscoreSpace => self.base(&raw.replace('_', " ")),
            MatchStrategy::RawCaseInsensitive => raw.trim().to_lowercase(),
        }
    }

    fn base(&self, raw: &str) -> String {
        match self {
            Self::Simple => normalize(raw),
            Self::Strict => normalize_strict(raw),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "strict" => Ok(Self::Strict),
            other => Err(format!("Unknown match policy: {other} (expected simple or strict)")),
        }
    }
}
