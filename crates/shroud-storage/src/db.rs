use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::migrations;
use crate::models::{normalize_domain, ChangeCause, Cookie, CookieChange};

/// Registered change listeners, keyed by subscription id
#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: Vec<(u64, UnboundedSender<CookieChange>)>,
}

impl Subscribers {
    fn register(&mut self, sender: UnboundedSender<CookieChange>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.senders.push((id, sender));
        id
    }

    fn unregister(&mut self, id: u64) {
        self.senders.retain(|(sub_id, _)| *sub_id != id);
    }

    fn broadcast(&mut self, change: &CookieChange) {
        self.senders
            .retain(|(_, sender)| sender.send(change.clone()).is_ok());
    }
}

type CookieKey = (String, String);

/// Connection plus what this process last saw, for detecting foreign writes
struct Inner {
    conn: Connection,
    known: BTreeMap<CookieKey, Cookie>,
    data_version: i64,
}

/// SQLite-backed cookie jar with an ordered change-notification stream
pub struct CookieJar {
    inner: Mutex<Inner>,
    subscribers: Arc<Mutex<Subscribers>>,
    partition: String,
}

impl CookieJar {
    /// Open (or create) the jar at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation, connection opening, or schema initialization fails
    pub fn open(path: &Path, partition: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cookie store directory")?;
        }

        let conn = Connection::open(path).context("Failed to open cookie store")?;
        migrations::init_schema(&conn)?;

        log::info!(
            "Cookie store for partition '{partition}' opened at: {}",
            path.display()
        );

        Self::with_connection(conn, partition)
    }

    /// Open the jar for `partition` at its default location
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened
    pub fn open_partition(partition: &str) -> Result<Self> {
        Self::open(&Self::default_path(partition), partition)
    }

    /// Volatile jar used by tests and dry runs
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory schema cannot be created
    pub fn in_memory(partition: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::init_schema(&conn)?;
        Self::with_connection(conn, partition)
    }

    fn with_connection(conn: Connection, partition: &str) -> Result<Self> {
        let known = load_all(&conn)?;
        let data_version = data_version(&conn)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                known,
                data_version,
            }),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            partition: partition.to_string(),
        })
    }

    /// Default on-disk location: `<data_local_dir>/shroud/partitions/<partition>.db`
    #[must_use]
    pub fn default_path(partition: &str) -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("shroud");
        path.push("partitions");
        let file_name: String = partition
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        path.push(format!("{file_name}.db"));
        path
    }

    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("cookie store lock poisoned"))
    }

    /// All cookies belonging to `domain` or any of its subdomains, ordered by name
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn cookies(&self, domain: &str) -> Result<Vec<Cookie>> {
        let inner = self.lock()?;
        let scope = normalize_domain(domain);
        let mut stmt = inner.conn.prepare(
            "SELECT domain, name, value, updated_at
             FROM cookies
             WHERE domain LIKE ?1
             ORDER BY name, domain",
        )?;

        let cookies = stmt
            .query_map(params![format!("%{scope}")], row_to_cookie)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cookies
            .into_iter()
            .filter(|cookie| cookie.in_scope(&scope))
            .collect())
    }

    /// Look up a single cookie by exact domain and name
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get(&self, domain: &str, name: &str) -> Result<Option<Cookie>> {
        let inner = self.lock()?;
        Self::find(&inner.conn, &normalize_domain(domain), name)
    }

    fn find(conn: &Connection, domain: &str, name: &str) -> Result<Option<Cookie>> {
        let cookie = conn
            .query_row(
                "SELECT domain, name, value, updated_at FROM cookies
                 WHERE domain = ?1 AND name = ?2",
                params![domain, name],
                row_to_cookie,
            )
            .optional()?;
        Ok(cookie)
    }

    /// Insert or replace a cookie.
    ///
    /// Replacing an existing cookie notifies `(old, overwrite, removed)` before
    /// `(new, explicit, !removed)`, the same sequence Chromium emits.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub fn set(&self, domain: &str, name: &str, value: &str) -> Result<Cookie> {
        let mut inner = self.lock()?;
        let cookie = Cookie::new(domain, name, value);
        let previous = Self::find(&inner.conn, &cookie.domain, name)?;

        inner.conn.execute(
            "INSERT INTO cookies (domain, name, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(domain, name) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![
                cookie.domain,
                cookie.name,
                cookie.value,
                cookie.updated_at.to_rfc3339(),
            ],
        )?;

        log::debug!(
            "Cookie set [{}] {}={} on {}",
            self.partition,
            cookie.name,
            cookie.value,
            cookie.domain
        );

        inner.known.insert(
            (cookie.domain.clone(), cookie.name.clone()),
            cookie.clone(),
        );

        // Notify while still holding the connection so delivery order matches commit order
        if let Some(old) = previous {
            self.notify(&CookieChange {
                cookie: old,
                cause: ChangeCause::Overwrite,
                removed: true,
            });
        }
        self.notify(&CookieChange {
            cookie: cookie.clone(),
            cause: ChangeCause::Explicit,
            removed: false,
        });
        drop(inner);

        Ok(cookie)
    }

    /// Delete a cookie. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub fn remove(&self, domain: &str, name: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let domain = normalize_domain(domain);
        let Some(existing) = Self::find(&inner.conn, &domain, name)? else {
            return Ok(false);
        };

        inner.conn.execute(
            "DELETE FROM cookies WHERE domain = ?1 AND name = ?2",
            params![domain, name],
        )?;
        inner.known.remove(&(existing.domain.clone(), name.to_string()));

        log::debug!("Cookie removed [{}] {name} on {domain}", self.partition);

        self.notify(&CookieChange {
            cookie: existing,
            cause: ChangeCause::Explicit,
            removed: true,
        });
        drop(inner);

        Ok(true)
    }

    /// Pick up writes committed through other connections (another process) and
    /// notify them as if they had happened here. Returns how many changes were emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read
    pub fn refresh(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let version = data_version(&inner.conn)?;
        if version == inner.data_version {
            return Ok(0);
        }
        inner.data_version = version;

        let current = load_all(&inner.conn)?;
        let changes = diff(&inner.known, &current);
        inner.known = current;

        if !changes.is_empty() {
            log::debug!(
                "Picked up {} external cookie change(s) [{}]",
                changes.len(),
                self.partition
            );
        }
        for change in &changes {
            self.notify(change);
        }
        drop(inner);

        Ok(changes.len())
    }

    /// Register for change notifications. Dropping the subscription unregisters it.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.register(sender),
            Err(_) => {
                log::warn!("Subscriber registry poisoned; subscription will receive nothing");
                u64::MAX
            }
        };

        Subscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|subscribers| subscribers.senders.len())
            .unwrap_or_default()
    }

    fn notify(&self, change: &CookieChange) {
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.broadcast(change),
            Err(_) => log::warn!("Subscriber registry poisoned; dropped change notification"),
        }
    }
}

fn data_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

fn load_all(conn: &Connection) -> Result<BTreeMap<CookieKey, Cookie>> {
    let mut stmt = conn.prepare("SELECT domain, name, value, updated_at FROM cookies")?;
    let cookies = stmt
        .query_map([], row_to_cookie)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cookies
        .into_iter()
        .map(|cookie| ((cookie.domain.clone(), cookie.name.clone()), cookie))
        .collect())
}

/// Changes that turn `before` into `after`, in the same shape `set`/`remove` emit
fn diff(
    before: &BTreeMap<CookieKey, Cookie>,
    after: &BTreeMap<CookieKey, Cookie>,
) -> Vec<CookieChange> {
    let mut changes = Vec::new();

    for (key, old) in before {
        match after.get(key) {
            None => changes.push(CookieChange {
                cookie: old.clone(),
                cause: ChangeCause::Explicit,
                removed: true,
            }),
            Some(new) if new.value != old.value => {
                changes.push(CookieChange {
                    cookie: old.clone(),
                    cause: ChangeCause::Overwrite,
                    removed: true,
                });
                changes.push(CookieChange {
                    cookie: new.clone(),
                    cause: ChangeCause::Explicit,
                    removed: false,
                });
            }
            Some(_) => {}
        }
    }

    for (key, new) in after {
        if !before.contains_key(key) {
            changes.push(CookieChange {
                cookie: new.clone(),
                cause: ChangeCause::Explicit,
                removed: false,
            });
        }
    }

    changes
}

fn row_to_cookie(row: &rusqlite::Row<'_>) -> rusqlite::Result<Cookie> {
    let updated_at: String = row.get(3)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    let domain: String = row.get(0)?;

    Ok(Cookie {
        domain: normalize_domain(&domain),
        name: row.get(1)?,
        value: row.get(2)?,
        updated_at,
    })
}

/// Receiving end of a cookie change stream. Changes arrive in commit order.
pub struct Subscription {
    id: u64,
    receiver: UnboundedReceiver<CookieChange>,
    registry: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    /// Wait for the next change; `None` once the jar is gone
    pub async fn recv(&mut self) -> Option<CookieChange> {
        self.receiver.recv().await
    }

    /// Next already-delivered change, without waiting
    pub fn try_recv(&mut self) -> Option<CookieChange> {
        match self.receiver.try_recv() {
            Ok(change) => Some(change),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stop receiving changes
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut subscribers) = registry.lock() {
                subscribers.unregister(self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "zadark.com";

    fn jar() -> CookieJar {
        CookieJar::in_memory("persist:test").unwrap()
    }

    #[test]
    fn test_set_then_list() {
        let jar = jar();
        jar.set(DOMAIN, "b", "false").unwrap();
        jar.set(DOMAIN, "a", "true").unwrap();

        let cookies = jar.cookies(DOMAIN).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "a");
        assert_eq!(cookies[0].value, "true");
        assert_eq!(cookies[1].name, "b");
    }

    #[test]
    fn test_cookies_are_domain_scoped() {
        let jar = jar();
        jar.set(DOMAIN, "mine", "true").unwrap();
        jar.set("chat.zadark.com", "sub", "true").unwrap();
        jar.set("zalo.me", "theirs", "true").unwrap();
        jar.set("evilzadark.com", "lookalike", "true").unwrap();

        let names: Vec<String> = jar
            .cookies(DOMAIN)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["mine".to_string(), "sub".to_string()]);
    }

    #[test]
    fn test_empty_domain_returns_no_entries() {
        let jar = jar();
        assert!(jar.cookies(DOMAIN).unwrap().is_empty());
    }

    #[test]
    fn test_set_replaces_value() {
        let jar = jar();
        jar.set(DOMAIN, "k", "true").unwrap();
        jar.set(DOMAIN, "k", "false").unwrap();

        let cookie = jar.get(DOMAIN, "k").unwrap().unwrap();
        assert_eq!(cookie.value, "false");
        assert_eq!(jar.cookies(DOMAIN).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_reports_presence() {
        let jar = jar();
        assert!(!jar.remove(DOMAIN, "k").unwrap());

        jar.set(DOMAIN, "k", "true").unwrap();
        assert!(jar.remove(DOMAIN, "k").unwrap());
        assert!(jar.get(DOMAIN, "k").unwrap().is_none());
    }

    #[test]
    fn test_new_cookie_notifies_explicit() {
        let jar = jar();
        let mut sub = jar.subscribe();

        jar.set(DOMAIN, "k", "true").unwrap();

        let change = sub.try_recv().unwrap();
        assert_eq!(change.cause, ChangeCause::Explicit);
        assert!(!change.removed);
        assert_eq!(change.cookie.value, "true");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_overwrite_notifies_removal_then_insert() {
        let jar = jar();
        jar.set(DOMAIN, "k", "true").unwrap();
        let mut sub = jar.subscribe();

        jar.set(DOMAIN, "k", "false").unwrap();

        let first = sub.try_recv().unwrap();
        assert_eq!(first.cause, ChangeCause::Overwrite);
        assert!(first.removed);
        assert_eq!(first.cookie.value, "true");

        let second = sub.try_recv().unwrap();
        assert_eq!(second.cause, ChangeCause::Explicit);
        assert!(!second.removed);
        assert_eq!(second.cookie.value, "false");
    }

    #[test]
    fn test_remove_notifies_removed() {
        let jar = jar();
        jar.set(DOMAIN, "k", "true").unwrap();
        let mut sub = jar.subscribe();

        jar.remove(DOMAIN, "k").unwrap();

        let change = sub.try_recv().unwrap();
        assert!(change.removed);
        assert_eq!(change.cause, ChangeCause::Explicit);
        assert_eq!(change.cookie.name, "k");
    }

    #[test]
    fn test_notifications_preserve_order() {
        let jar = jar();
        let mut sub = jar.subscribe();

        for value in ["a", "b", "c"] {
            jar.set(DOMAIN, "k", value).unwrap();
        }

        let inserted: Vec<String> = std::iter::from_fn(|| sub.try_recv())
            .filter(|change| !change.removed)
            .map(|change| change.cookie.value)
            .collect();
        assert_eq!(inserted, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let jar = jar();
        let sub = jar.subscribe();
        let mut other = jar.subscribe();
        assert_eq!(jar.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(jar.subscriber_count(), 1);

        jar.set(DOMAIN, "k", "true").unwrap();
        assert!(other.try_recv().is_some());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cookies.db");

        {
            let jar = CookieJar::open(&path, "persist:test").unwrap();
            jar.set(DOMAIN, "k", "true").unwrap();
        }

        let reopened = CookieJar::open(&path, "persist:test").unwrap();
        assert_eq!(reopened.get(DOMAIN, "k").unwrap().unwrap().value, "true");
    }

    #[test]
    fn test_domain_case_does_not_split_entries() {
        let jar = jar();
        jar.set("ZaDark.com", "k", "true").unwrap();
        jar.set("zadark.com", "k", "false").unwrap();

        let cookies = jar.cookies("ZADARK.COM").unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain, DOMAIN);
        assert_eq!(cookies[0].value, "false");
        assert!(jar.remove("zaDARK.com", "k").unwrap());
        assert!(jar.get(DOMAIN, "k").unwrap().is_none());
    }

    #[test]
    fn test_mixed_case_rows_from_other_writers_are_listed() {
        let jar = jar();
        jar.lock()
            .unwrap()
            .conn
            .execute(
                "INSERT INTO cookies VALUES ('ZaDark.COM', 'k', 'true', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        let cookies = jar.cookies(DOMAIN).unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain, DOMAIN);
        assert_eq!(jar.get(DOMAIN, "k").unwrap().unwrap().value, "true");
    }

    #[test]
    fn test_refresh_without_foreign_writes_is_quiet() {
        let jar = jar();
        let mut sub = jar.subscribe();
        jar.set(DOMAIN, "k", "true").unwrap();
        sub.try_recv().unwrap();

        assert_eq!(jar.refresh().unwrap(), 0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_refresh_sees_other_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.db");
        let writer = CookieJar::open(&path, "persist:test").unwrap();
        writer.set(DOMAIN, "gone", "true").unwrap();
        writer.set(DOMAIN, "edited", "false").unwrap();

        let reader = CookieJar::open(&path, "persist:test").unwrap();
        let mut sub = reader.subscribe();

        writer.set(DOMAIN, "edited", "true").unwrap();
        writer.set(DOMAIN, "added", "true").unwrap();
        writer.remove(DOMAIN, "gone").unwrap();

        assert_eq!(reader.refresh().unwrap(), 4);
        let changes: Vec<CookieChange> = std::iter::from_fn(|| sub.try_recv()).collect();

        let removed_gone = changes
            .iter()
            .any(|c| c.cookie.name == "gone" && c.removed);
        let edited_overwrite = changes
            .iter()
            .position(|c| c.cookie.name == "edited" && c.cause == ChangeCause::Overwrite)
            .unwrap();
        let edited_insert = changes
            .iter()
            .position(|c| c.cookie.name == "edited" && !c.removed)
            .unwrap();
        let added = changes
            .iter()
            .find(|c| c.cookie.name == "added")
            .unwrap();

        assert!(removed_gone);
        assert!(edited_overwrite < edited_insert);
        assert_eq!(changes[edited_insert].cookie.value, "true");
        assert!(!added.removed);

        // Already caught up
        assert_eq!(reader.refresh().unwrap(), 0);
    }

    #[test]
    fn test_default_path_sanitizes_partition() {
        let path = CookieJar::default_path("persist:zalo");
        assert!(path.ends_with("shroud/partitions/persist_zalo.db"));
    }
}
