use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::filter::{Decision, RequestFilter};
use crate::mirror::MirrorSnapshot;
use crate::notification::{HostWindow, NotificationRedactor, SurfaceOutcome};
use crate::store::PreferenceStore;
use crate::sync::{MirrorHandle, SettingsSync};

/// Main-process entry point the host's hooks call into.
///
/// Created together with the [`SettingsSync`] that feeds it; the caller drives
/// the sync loop (usually on its own task) for as long as the host runs.
pub struct PrivacyGuard {
    filter: RequestFilter,
    redactor: NotificationRedactor,
    mirror: MirrorHandle,
}

impl PrivacyGuard {
    /// Load settings, subscribe to changes, and build the guard
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in interception patterns fail to compile
    pub fn start(store: Arc<dyn PreferenceStore>, config: &Config) -> Result<(Self, SettingsSync)> {
        let filter = RequestFilter::new().context("Failed to compile request filter")?;
        let sync = SettingsSync::start(store.as_ref());
        let redactor = NotificationRedactor::new(store, config);

        log::info!(
            "Privacy guard ready: {} interception pattern(s), notification redaction {}",
            filter.patterns().len(),
            if redactor.is_enabled() { "on" } else { "off" }
        );

        Ok((
            Self {
                filter,
                redactor,
                mirror: sync.handle(),
            },
            sync,
        ))
    }

    /// Snapshot the filter currently decides against
    #[must_use]
    pub fn snapshot(&self) -> MirrorSnapshot {
        *self.mirror.borrow()
    }

    /// Synchronous allow/cancel for an outbound request
    #[must_use]
    pub fn on_before_request(&self, url: &str) -> Decision {
        let snapshot = self.snapshot();
        self.filter.intercept(url, &snapshot)
    }

    /// Host hook for a window that finished loading
    pub async fn on_surface_loaded(&self, window: &dyn HostWindow) -> SurfaceOutcome {
        self.redactor.on_surface_loaded(window).await
    }

    #[must_use]
    pub fn filter(&self) -> &RequestFilter {
        &self.filter
    }
}
