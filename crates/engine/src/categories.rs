//! The fixed set of expense categories.

use core::fmt;
use std::str::FromStr;

use crate::EngineError;

/// Expense category.
///
/// Stored as its lowercase [`code`](Category::code). Documents written by
/// other clients may carry codes this enum does not know: they are kept
/// verbatim in storage and read back as [`Category::Other`] through
/// [`Category::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Academic,
    Food,
    Entertainment,
    Transportation,
    Personal,
    Housing,
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 7] = [
        Category::Academic,
        Category::Food,
        Category::Entertainment,
        Category::Transportation,
        Category::Personal,
        Category::Housing,
        Category::Other,
    ];

    /// Canonical storage code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Food => "food",
            Self::Entertainment => "entertainment",
            Self::Transportation => "transportation",
            Self::Personal => "personal",
            Self::Housing => "housing",
            Self::Other => "other",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Academic => "Academic",
            Self::Food => "Food & Dining",
            Self::Entertainment => "Entertainment",
            Self::Transportation => "Transportation",
            Self::Personal => "Personal Care",
            Self::Housing => "Housing",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Academic => "📚",
            Self::Food => "🍕",
            Self::Entertainment => "🎮",
            Self::Transportation => "🚗",
            Self::Personal => "🛍️",
            Self::Housing => "🏠",
            Self::Other => "📦",
        }
    }

    /// Lenient lookup used when reading: unknown codes become `Other`.
    #[must_use]
    pub fn resolve(code: &str) -> Category {
        code.parse().unwrap_or(Category::Other)
    }

    /// Position inside [`Category::ALL`].
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.code() == normalized)
            .ok_or_else(|| EngineError::validation(format!("unknown category: {value}")))
    }
}
