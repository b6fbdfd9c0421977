use regex::Regex;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern '{0}' has no scheme separator")]
    MissingScheme(String),
    #[error("pattern '{0}' has no path")]
    MissingPath(String),
    #[error("pattern '{0}' has an invalid host wildcard")]
    InvalidHost(String),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// Chromium-style URL match pattern, e.g. `*://*.example.com/api/*?*`.
///
/// A `*` scheme matches http, https, ws and wss. A `*.` host prefix matches the
/// host itself and every subdomain. `*` in the path matches any run of characters,
/// query string included. Userinfo (`user:pass@`) in the URL is ignored.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    /// # Errors
    ///
    /// Returns an error if the pattern is not `<scheme>://<host><path>`
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| PatternError::MissingScheme(pattern.to_string()))?;
        let path_start = rest
            .find('/')
            .ok_or_else(|| PatternError::MissingPath(pattern.to_string()))?;
        let (host, path) = rest.split_at(path_start);

        let scheme_re = if scheme == "*" {
            "(?:https?|wss?)".to_string()
        } else {
            regex::escape(scheme)
        };

        let host_re = if host == "*" {
            "[^/:]+".to_string()
        } else if let Some(domain) = host.strip_prefix("*.") {
            format!(r"(?:[^/:]+\.)?{}", regex::escape(domain))
        } else if host.contains('*') || host.is_empty() {
            return Err(PatternError::InvalidHost(pattern.to_string()));
        } else {
            regex::escape(host)
        };

        let path_re = path
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!(r"^(?i:{scheme_re}://{host_re})(?::\d+)?{path_re}$"))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(&strip_userinfo(url))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Drop `user:pass@` from the authority, leaving the rest of the URL as is
fn strip_userinfo(url: &str) -> Cow<'_, str> {
    let Some(scheme_end) = url.find("://") else {
        return Cow::Borrowed(url);
    };
    let authority_start = scheme_end + 3;
    let authority_len = url[authority_start..]
        .find(['/', '?', '#'])
        .unwrap_or(url.len() - authority_start);
    let authority = &url[authority_start..authority_start + authority_len];

    match authority.rfind('@') {
        Some(at) => Cow::Owned(format!(
            "{}{}",
            &url[..authority_start],
            &url[authority_start + at + 1..]
        )),
        None => Cow::Borrowed(url),
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
