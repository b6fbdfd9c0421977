
use shroud_storage::{Cookie, CookieChange};

use crate::flags::{parse_value, Flag, FlagGroup, COOKIE_DOMAIN};
use crate::store::PreferenceStore;

/// Immutable copy of every flag at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorSnapshot {
    values: [bool; Flag::ALL.len()],
}

impl MirrorSnapshot {
    #[must_use]
    pub fn get(&self, flag: Flag) -> bool {
        self.values[flag.index()]
    }

    /// Copy with one flag replaced
    #[must_use]
    pub fn with(mut self, flag: Flag, value: bool) -> Self {
        self.values[flag.index()] = value;
        self
    }

    /// Values of one group, in declaration order
    #[must_use]
    pub fn group(&self, group: FlagGroup) -> Vec<(Flag, bool)> {
        group
            .flags()
            .iter()
            .map(|&flag| (flag, self.get(flag)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Flag, bool)> + '_ {
        Flag::ALL.into_iter().map(|flag| (flag, self.get(flag)))
    }

    /// Whether any flag in `group` is enabled
    #[must_use]
    pub fn any(&self, group: FlagGroup) -> bool {
        group.flags().iter().any(|&flag| self.get(flag))
    }
}

/// In-memory boolean mirror of the persisted flags.
///
/// Starts with everything `false`. Changes only through [`SettingsMirror::load`]
/// and the change-notification path.
#[derive(Debug, Clone, Default)]
pub struct SettingsMirror {
    snapshot: MirrorSnapshot,
}

impl SettingsMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load from the store. A failing or empty store leaves the defaults in place.
    ///
    /// Returns how many flags were found.
    pub fn load(&mut self, store: &dyn PreferenceStore) -> usize {
        match store.entries(COOKIE_DOMAIN) {
            Ok(entries) => {
                let found = self.load_entries(&entries);
                log::debug!("Loaded {found} flag(s) from store: {:?}", self.snapshot);
                found
            }
            Err(e) => {
                log::warn!("Failed to read settings from store, keeping defaults: {e}");
                0
            }
        }
    }

    /// Apply a batch of stored entries; flags without an entry keep their value.
    ///
    /// Only entries set on [`COOKIE_DOMAIN`] itself count. Copies on subdomains
    /// are ignored here and in [`SettingsMirror::apply`] alike, so a live mirror
    /// and a fresh load always agree.
    pub fn load_entries(&mut self, entries: &[Cookie]) -> usize {
        let mut found = 0;
        for cookie in entries.iter().filter(|c| c.is_domain(COOKIE_DOMAIN)) {
            if let Some(flag) = Flag::from_storage_name(&cookie.name) {
                self.set(flag, parse_value(&cookie.value));
                found += 1;
            }
        }
        found
    }

    /// Apply one change notification. Unknown keys are ignored.
    pub fn on_change(&mut self, key: &str, raw_value: &str, removed: bool) -> Option<Flag> {
        let Some(flag) = Flag::from_storage_name(key) else {
            log::trace!("Ignoring change to unrelated entry '{key}'");
            return None;
        };
        self.set(flag, !removed && parse_value(raw_value));
        Some(flag)
    }

    /// Apply a store notification, skipping entries outside the flag domain
    pub fn apply(&mut self, change: &CookieChange) -> Option<Flag> {
        if !change.cookie.is_domain(COOKIE_DOMAIN) {
            return None;
        }
        self.on_change(&change.cookie.name, &change.cookie.value, change.removed)
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        self.snapshot = self.snapshot.with(flag, value);
    }

    #[must_use]
    pub fn get(&self, flag: Flag) -> bool {
        self.snapshot.get(flag)
    }

    #[must_use]
    pub fn snapshot(&self) -> MirrorSnapshot {
        self.snapshot
    }
}
