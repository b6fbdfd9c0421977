//! Presence-signal request filter.
//!
//! The host only hands us requests matching [`filter_urls`]; within that scope a
//! request is cancelled when its URL belongs to a category whose flag is on.


pub mod pattern;

pub use pattern::{PatternError, UrlPattern};

use std::fmt;

use crate::flags::Flag;
use crate::mirror::MirrorSnapshot;

/// Interception domains, in Chromium match-pattern form
pub const FILTER_DOMAINS: &[&str] = &["*://*.zalo.me", "*://*.zaloapp.com"];

/// Interception paths, appended to every domain
pub const FILTER_PATHS: &[&str] = &[
    // Typing
    "/api/message/typing?*",
    "/api/group/typing?*",
    // Delivered
    "/api/message/deliveredv2?*",
    "/api/e2ee/pc/t/message/delivered?*",
    "/api/group/deliveredv2?*",
    // Seen
    "/api/message/seenv2?*",
    "/api/group/seenv2?*",
];

/// Kind of presence signal an endpoint sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Typing,
    Delivered,
    Seen,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Typing, Category::Delivered, Category::Seen];

    /// Flag that suppresses this category
    #[must_use]
    pub fn flag(self) -> Flag {
        match self {
            Self::Typing => Flag::BlockTyping,
            Self::Delivered => Flag::BlockDelivered,
            Self::Seen => Flag::BlockSeen,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::Delivered => "delivered",
            Self::Seen => "seen",
        }
    }

    pub fn fragments(self) -> impl Iterator<Item = &'static str> {
        RULES
            .iter()
            .filter(move |rule| rule.category == self)
            .map(|rule| rule.fragment)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL substring that marks a request as belonging to a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRule {
    pub fragment: &'static str,
    pub category: Category,
}

pub const RULES: &[FilterRule] = &[
    FilterRule {
        fragment: "api/message/typing",
        category: Category::Typing,
    },
    FilterRule {
        fragment: "api/group/typing",
        category: Category::Typing,
    },
    FilterRule {
        fragment: "api/message/deliveredv2",
        category: Category::Delivered,
    },
    FilterRule {
        fragment: "api/e2ee/pc/t/message/delivered",
        category: Category::Delivered,
    },
    FilterRule {
        fragment: "api/group/deliveredv2",
        category: Category::Delivered,
    },
    FilterRule {
        fragment: "api/message/seenv2",
        category: Category::Seen,
    },
    FilterRule {
        fragment: "api/group/seenv2",
        category: Category::Seen,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Cancel,
}

impl Decision {
    #[must_use]
    pub fn is_cancel(self) -> bool {
        self == Self::Cancel
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Cancel => "cancel",
        })
    }
}

/// Every domain/path combination the host should route through the filter
#[must_use]
pub fn filter_urls() -> Vec<String> {
    FILTER_PATHS
        .iter()
        .flat_map(|path| FILTER_DOMAINS.iter().map(move |domain| format!("{domain}{path}")))
        .collect()
}

/// Categories whose fragments occur in `url`, without duplicates
#[must_use]
pub fn classify(url: &str) -> Vec<Category> {
    Category::ALL
        .into_iter()
        .filter(|category| category.fragments().any(|fragment| url.contains(fragment)))
        .collect()
}

/// Cancel when any matched category has its flag on; otherwise allow
#[must_use]
pub fn decide(url: &str, snapshot: &MirrorSnapshot) -> Decision {
    for category in classify(url) {
        if snapshot.get(category.flag()) {
            log::debug!("{}: cancelled {url}", category.flag());
            return Decision::Cancel;
        }
    }
    Decision::Allow
}

/// Compiled interception scope plus the decision rule
#[derive(Debug, Clone)]
pub struct RequestFilter {
    patterns: Vec<UrlPattern>,
}

impl RequestFilter {
    /// Filter over the built-in endpoint table
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in pattern fails to compile
    pub fn new() -> Result<Self, PatternError> {
        Self::with_patterns(&filter_urls())
    }

    /// # Errors
    ///
    /// Returns an error if any pattern is malformed
    pub fn with_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| UrlPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether the host would route `url` to this filter at all
    #[must_use]
    pub fn in_scope(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(url))
    }

    /// Full interception step: out-of-scope traffic is allowed without evaluation
    #[must_use]
    pub fn intercept(&self, url: &str, snapshot: &MirrorSnapshot) -> Decision {
        if !self.in_scope(url) {
            return Decision::Allow;
        }
        decide(url, snapshot)
    }

    #[must_use]
    pub fn patterns(&self) -> &[UrlPattern] {
        &self.patterns
    }
}
