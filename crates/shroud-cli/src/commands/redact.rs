//! Notification redaction preview
use anyhow::Result;
use shroud_core::redaction::{self, ClassList};
use shroud_core::{Config, SettingsMirror};

pub fn handle_redact(config: &Config, classes: &str, script: bool) -> Result<()> {
    let store = config.open_store()?;
    let mut mirror = SettingsMirror::new();
    mirror.load(&store);
    let snapshot = mirror.snapshot();

    if script {
        print!("{}", redaction::script(&snapshot));
        return Ok(());
    }

    let mut list = ClassList::parse(classes);
    let changed = redaction::apply(&mut list, &snapshot);
    println!("{list}");
    log::debug!("Class list {}", if changed { "updated" } else { "unchanged" });
    Ok(())
}
