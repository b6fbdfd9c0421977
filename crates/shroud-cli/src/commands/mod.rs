pub mod check;
pub mod config;
pub mod flags;
pub mod redact;
pub mod watch;

/// Human label for a flag value
#[must_use]
pub fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "off"
    }
}
