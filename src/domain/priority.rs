//! Request priority classes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority class of a request.
///
/// Lower discriminant is served first: `Critical < High < Normal < Low`.
/// The derived `Ord` follows declaration order, so sorting ascending puts
/// the most urgent class at the front.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Needed immediately (user is waiting on it).
    Critical = 0,
    /// Needed soon.
    High = 1,
    /// Standard foreground traffic.
    #[default]
    Normal = 2,
    /// Background work such as analytics upload.
    Low = 3,
}

impl Priority {
    /// All classes, most urgent first.
    pub const ALL: [Priority; 4] = [Self::Critical, Self::High, Self::Normal, Self::Low];

    /// Numeric rank (lower = served first).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
