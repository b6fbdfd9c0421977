pub mod config;
pub mod filter;
pub mod flags;
pub mod guard;
pub mod mirror;
pub mod notification;
pub mod redaction;
pub mod store;
pub mod sync;

pub use config::{get_data_dir, Config, RedactionMode};
pub use filter::{Category, Decision, RequestFilter};
pub use flags::{Flag, FlagError, FlagGroup, COOKIE_DOMAIN, PARTITION};
pub use guard::PrivacyGuard;
pub use mirror::{MirrorSnapshot, SettingsMirror};
pub use notification::{HostWindow, NotificationRedactor, SurfaceOutcome};
pub use store::PreferenceStore;
pub use sync::{FlagTransition, MirrorHandle, SettingsSync};
