//! Preference flags and their persisted representation.
//!
//! Flags are stored as cookies under [`COOKIE_DOMAIN`] whose values are the
//! literal strings `"true"` / `"false"`. Everything past [`parse_value`] works
//! with plain `bool`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cookie domain every flag lives under
pub const COOKIE_DOMAIN: &str = "zadark.com";

/// Session partition the host keeps its cookies in
pub const PARTITION: &str = "persist:zalo";

const TRUE_VALUE: &str = "true";
const FALSE_VALUE: &str = "false";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlagError {
    #[error("unknown flag '{0}' (expected one of: block_typing, block_delivered, block_seen, hide_content, hide_sender)")]
    UnknownFlag(String),
    #[error("invalid toggle '{0}' (expected on/off, true/false, yes/no or 1/0)")]
    InvalidToggle(String),
}

/// Which concern a flag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagGroup {
    /// Suppress outbound presence signals
    BlockSignal,
    /// Redact the notification window
    NotificationPrivacy,
}

impl FlagGroup {
    #[must_use]
    pub fn flags(self) -> &'static [Flag] {
        match self {
            Self::BlockSignal => &[Flag::BlockTyping, Flag::BlockDelivered, Flag::BlockSeen],
            Self::NotificationPrivacy => &[Flag::HideContent, Flag::HideSender],
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockSignal => "block",
            Self::NotificationPrivacy => "notification",
        }
    }
}

impl fmt::Display for FlagGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named boolean preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    BlockTyping,
    BlockDelivered,
    BlockSeen,
    HideContent,
    HideSender,
}

impl Flag {
    pub const ALL: [Flag; 5] = [
        Flag::BlockTyping,
        Flag::BlockDelivered,
        Flag::BlockSeen,
        Flag::HideContent,
        Flag::HideSender,
    ];

    /// Stable short key
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::BlockTyping => "block_typing",
            Self::BlockDelivered => "block_delivered",
            Self::BlockSeen => "block_seen",
            Self::HideContent => "hide_content",
            Self::HideSender => "hide_sender",
        }
    }

    /// Cookie name the settings UI writes this flag under
    #[must_use]
    pub fn storage_name(self) -> &'static str {
        match self {
            Self::BlockTyping => "@ZaDark:ENABLED_BLOCK_TYPING",
            Self::BlockDelivered => "@ZaDark:ENABLED_BLOCK_DELIVERED",
            Self::BlockSeen => "@ZaDark:ENABLED_BLOCK_SEEN",
            Self::HideContent => "@ZaDark:ENABLED_HIDE_NOTIFICATION_CONTENT",
            Self::HideSender => "@ZaDark:ENABLED_HIDE_NOTIFICATION_SENDER",
        }
    }

    #[must_use]
    pub fn group(self) -> FlagGroup {
        match self {
            Self::BlockTyping | Self::BlockDelivered | Self::BlockSeen => FlagGroup::BlockSignal,
            Self::HideContent | Self::HideSender => FlagGroup::NotificationPrivacy,
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::BlockTyping => "Hide that you are typing",
            Self::BlockDelivered => "Hide that messages were delivered",
            Self::BlockSeen => "Hide that messages were seen",
            Self::HideContent => "Hide message text in notifications",
            Self::HideSender => "Hide sender name in notifications",
        }
    }

    /// Resolve a persisted entry name. Only the exact cookie name counts; a
    /// stored entry spelled like a short key is not a flag.
    #[must_use]
    pub fn from_storage_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.storage_name() == name)
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.key() == key)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Flag {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_lowercase();
        Self::from_key(&normalized)
            .or_else(|| Self::from_storage_name(s.trim()))
            .ok_or_else(|| FlagError::UnknownFlag(s.to_string()))
    }
}

/// Boundary parser: only the literal `"true"` means enabled
#[must_use]
pub fn parse_value(raw: &str) -> bool {
    raw == TRUE_VALUE
}

/// Persisted form of a flag value
#[must_use]
pub fn encode_value(enabled: bool) -> &'static str {
    if enabled {
        TRUE_VALUE
    } else {
        FALSE_VALUE
    }
}

/// Parse a user-facing on/off switch
///
/// # Errors
///
/// Returns [`FlagError::InvalidToggle`] for anything that is not a recognised switch word
pub fn parse_toggle(input: &str) -> Result<bool, FlagError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" | "enable" | "enabled" => Ok(true),
        "off" | "false" | "no" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(FlagError::InvalidToggle(input.to_string())),
    }
}
