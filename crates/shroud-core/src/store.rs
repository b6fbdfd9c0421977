use anyhow::Result;
use shroud_storage::{Cookie, CookieJar, Subscription};

use crate::flags::{encode_value, parse_value, Flag, COOKIE_DOMAIN};

/// Persisted key/value store the settings are mirrored from
pub trait PreferenceStore: Send + Sync {
    /// All entries under `domain`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read
    fn entries(&self, domain: &str) -> Result<Vec<Cookie>>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be written
    fn write(&self, domain: &str, name: &str, value: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be written
    fn remove(&self, domain: &str, name: &str) -> Result<bool>;

    /// Ordered change notifications for every entry in the store
    fn subscribe(&self) -> Subscription;

    /// Re-read writes made by other processes and notify subscribers of them.
    /// Stores only ever written in-process have nothing to pick up.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read
    fn refresh(&self) -> Result<usize> {
        Ok(0)
    }
}

impl PreferenceStore for CookieJar {
    fn entries(&self, domain: &str) -> Result<Vec<Cookie>> {
        self.cookies(domain)
    }

    fn write(&self, domain: &str, name: &str, value: &str) -> Result<()> {
        self.set(domain, name, value).map(|_| ())
    }

    fn remove(&self, domain: &str, name: &str) -> Result<bool> {
        CookieJar::remove(self, domain, name)
    }

    fn subscribe(&self) -> Subscription {
        CookieJar::subscribe(self)
    }

    fn refresh(&self) -> Result<usize> {
        CookieJar::refresh(self)
    }
}

/// Persist a flag the way the settings UI does: as the literal `"true"` / `"false"`
///
/// # Errors
///
/// Returns an error if the store write fails
pub fn save_flag(store: &dyn PreferenceStore, flag: Flag, enabled: bool) -> Result<()> {
    store.write(COOKIE_DOMAIN, flag.storage_name(), encode_value(enabled))?;
    log::info!("Saved {flag} = {enabled}");
    Ok(())
}

/// Remove a flag's entry so it falls back to its default
///
/// # Errors
///
/// Returns an error if the store write fails
pub fn clear_flag(store: &dyn PreferenceStore, flag: Flag) -> Result<bool> {
    let removed = store.remove(COOKIE_DOMAIN, flag.storage_name())?;
    if removed {
        log::info!("Cleared {flag}");
    }
    Ok(removed)
}

/// Read one flag straight from the store, bypassing any mirror
///
/// # Errors
///
/// Returns an error if the store cannot be read
pub fn read_flag(store: &dyn PreferenceStore, flag: Flag) -> Result<bool> {
    Ok(store
        .entries(COOKIE_DOMAIN)?
        .iter()
        .find(|cookie| {
            cookie.is_domain(COOKIE_DOMAIN) && Flag::from_storage_name(&cookie.name) == Some(flag)
        })
        .is_some_and(|cookie| parse_value(&cookie.value)))
}
