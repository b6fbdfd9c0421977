use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::mirror::SettingsMirror;
use crate::redaction;
use crate::store::PreferenceStore;

/// A window owned by the host application
#[async_trait]
pub trait HostWindow: Send + Sync {
    /// URL of the loaded document
    fn url(&self) -> String;

    /// Run a script in the window, returning its string result if any
    async fn execute_script(&self, script: &str) -> Result<Option<String>>;
}

/// What happened when a window finished loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOutcome {
    /// Not the notification window
    Ignored,
    /// Notification window, but redaction is switched off for this platform
    Disabled,
    /// Script ran; `class_name` is `None` when the target element was absent
    Applied { class_name: Option<String> },
    /// Host refused or failed to run the script
    Failed,
}

/// Projects the notification-privacy flags onto the host's notification window
pub struct NotificationRedactor {
    store: Arc<dyn PreferenceStore>,
    marker: String,
    enabled: bool,
}

impl NotificationRedactor {
    #[must_use]
    pub fn new(store: Arc<dyn PreferenceStore>, config: &Config) -> Self {
        Self {
            store,
            marker: config.notification_marker.clone(),
            enabled: config
                .notification_redaction
                .enabled_on(std::env::consts::OS),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn is_notification_surface(&self, url: &str) -> bool {
        url.contains(&self.marker)
    }

    /// Handle a host window that finished loading.
    ///
    /// The notification window runs in its own process, so the flags are read
    /// fresh from the store into a separate mirror rather than taken from the
    /// main-process one.
    pub async fn on_surface_loaded(&self, window: &dyn HostWindow) -> SurfaceOutcome {
        let url = window.url();
        if !self.is_notification_surface(&url) {
            return SurfaceOutcome::Ignored;
        }
        if !self.enabled {
            log::debug!("Notification window loaded but redaction is disabled on this platform");
            return SurfaceOutcome::Disabled;
        }

        let mut mirror = SettingsMirror::new();
        mirror.load(self.store.as_ref());
        let snapshot = mirror.snapshot();
        log::debug!(
            "Notification window detected, markers: {:?}",
            redaction::marker_classes(&snapshot)
        );

        match window.execute_script(&redaction::script(&snapshot)).await {
            Ok(class_name) => {
                match &class_name {
                    Some(classes) => log::debug!("Applied notification privacy classes: {classes}"),
                    None => log::debug!("Notification element not present yet"),
                }
                SurfaceOutcome::Applied { class_name }
            }
            Err(e) => {
                log::warn!("Failed to inject privacy classes: {e}");
                SurfaceOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedactionMode;
    use crate::flags::Flag;
    use crate::redaction::{ClassList, CONTENT_HIDDEN_CLASS, SENDER_HIDDEN_CLASS};
    use crate::store::save_flag;
    use shroud_storage::CookieJar;
    use std::sync::Mutex;

    /// Host window that records scripts and simulates the target element's classes
    struct FakeWindow {
        url: String,
        element: Option<Mutex<ClassList>>,
        fail: bool,
        scripts: Mutex<Vec<String>>,
    }

    impl FakeWindow {
        fn new(url: &str, element: Option<&str>) -> Self {
            Self {
                url: url.to_string(),
                element: element.map(|classes| Mutex::new(ClassList::parse(classes))),
                fail: false,
                scripts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HostWindow for FakeWindow {
        fn url(&self) -> String {
            self.url.clone()
        }

        async fn execute_script(&self, script: &str) -> Result<Option<String>> {
            self.scripts.lock().unwrap().push(script.to_string());
            if self.fail {
                anyhow::bail!("webContents destroyed");
            }
            let Some(element) = &self.element else {
                return Ok(None);
            };
            let mut classes = element.lock().unwrap();
            for class in [CONTENT_HIDDEN_CLASS, SENDER_HIDDEN_CLASS] {
                let wanted = script.contains(&format!("toggle('{class}', true)"));
                classes.toggle(class, wanted);
            }
            Ok(Some(classes.to_string()))
        }
    }

    fn redactor(mode: RedactionMode) -> (Arc<CookieJar>, NotificationRedactor) {
        let store = Arc::new(CookieJar::in_memory("persist:test").unwrap());
        let config = Config {
            notification_redaction: mode,
            ..Config::default()
        };
        let redactor = NotificationRedactor::new(store.clone(), &config);
        (store, redactor)
    }

    const NOTIFICATION_URL: &str = "file:///C:/Zalo/resources/app/pc-dist/znotification.html";

    #[tokio::test]
    async fn test_other_windows_are_ignored() {
        let (_store, redactor) = redactor(RedactionMode::Always);
        let window = FakeWindow::new("file:///C:/Zalo/resources/app/pc-dist/index.html", Some("zadark"));

        assert_eq!(redactor.on_surface_loaded(&window).await, SurfaceOutcome::Ignored);
        assert!(window.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_mode_does_not_inject() {
        let (_store, redactor) = redactor(RedactionMode::Never);
        let window = FakeWindow::new(NOTIFICATION_URL, Some("zadark"));

        assert_eq!(redactor.on_surface_loaded(&window).await, SurfaceOutcome::Disabled);
        assert!(window.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_applies_current_store_values() {
        let (store, redactor) = redactor(RedactionMode::Always);
        save_flag(store.as_ref(), Flag::HideContent, true).unwrap();
        save_flag(store.as_ref(), Flag::HideSender, false).unwrap();

        let window = FakeWindow::new(NOTIFICATION_URL, Some("zadark sender-hidden"));
        let outcome = redactor.on_surface_loaded(&window).await;

        assert_eq!(
            outcome,
            SurfaceOutcome::Applied {
                class_name: Some("zadark content-hidden".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_missing_element_is_a_no_op() {
        let (store, redactor) = redactor(RedactionMode::Always);
        save_flag(store.as_ref(), Flag::HideContent, true).unwrap();

        let window = FakeWindow::new(NOTIFICATION_URL, None);
        assert_eq!(
            redactor.on_surface_loaded(&window).await,
            SurfaceOutcome::Applied { class_name: None }
        );
    }

    #[tokio::test]
    async fn test_injection_failure_is_reported_not_raised() {
        let (_store, redactor) = redactor(RedactionMode::Always);
        let mut window = FakeWindow::new(NOTIFICATION_URL, Some("zadark"));
        window.fail = true;

        assert_eq!(redactor.on_surface_loaded(&window).await, SurfaceOutcome::Failed);
        assert_eq!(window.scripts.lock().unwrap().len(), 1);
    }
}
