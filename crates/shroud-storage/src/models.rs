use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single persisted name/value entry scoped to a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub domain: String,
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl Cookie {
    #[must_use]
    pub fn new(domain: &str, name: &str, value: &str) -> Self {
        Self {
            domain: normalize_domain(domain),
            name: name.to_string(),
            value: value.to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Whether this cookie belongs to `scope`: the domain itself or any subdomain of it
    #[must_use]
    pub fn in_scope(&self, scope: &str) -> bool {
        let scope = normalize_domain(scope);
        self.domain == scope
            || self
                .domain
                .strip_suffix(scope.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// Whether this cookie was set on exactly `domain`, not a subdomain
    #[must_use]
    pub fn is_domain(&self, domain: &str) -> bool {
        self.domain == normalize_domain(domain)
    }
}

/// Canonical domain form: lowercase, without the leading dot domain cookies carry
#[must_use]
pub fn normalize_domain(domain: &str) -> String {
    domain.trim_start_matches('.').to_ascii_lowercase()
}

/// Why a cookie changed. Names follow the Chromium cookie-change causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeCause {
    /// Written or deleted directly
    Explicit,
    /// Replaced by a write to the same name; always delivered with `removed = true`
    Overwrite,
    Expired,
    Evicted,
    ExpiredOverwrite,
}

impl ChangeCause {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Overwrite => "overwrite",
            Self::Expired => "expired",
            Self::Evicted => "evicted",
            Self::ExpiredOverwrite => "expired-overwrite",
        }
    }
}

impl fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the change-notification stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieChange {
    pub cookie: Cookie,
    pub cause: ChangeCause,
    pub removed: bool,
}
