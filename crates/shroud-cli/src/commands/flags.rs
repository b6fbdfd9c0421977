//! Flag inspection and editing command handlers
use anyhow::Result;
use shroud_core::{store, Config, Flag, SettingsMirror};
use tabled::{Table, Tabled};

use super::on_off;

#[derive(Tabled)]
struct FlagRow {
    #[tabled(rename = "Flag")]
    flag: &'static str,
    #[tabled(rename = "Group")]
    group: &'static str,
    #[tabled(rename = "State")]
    state: &'static str,
    #[tabled(rename = "Description")]
    description: &'static str,
}

pub fn handle_status(config: &Config, json: bool) -> Result<()> {
    let store = config.open_store()?;
    let mut mirror = SettingsMirror::new();
    mirror.load(&store);
    let snapshot = mirror.snapshot();

    if json {
        let values: serde_json::Map<String, serde_json::Value> = snapshot
            .iter()
            .map(|(flag, enabled)| (flag.key().to_string(), serde_json::Value::Bool(enabled)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    let rows: Vec<FlagRow> = snapshot
        .iter()
        .map(|(flag, enabled)| FlagRow {
            flag: flag.key(),
            group: flag.group().as_str(),
            state: on_off(enabled),
            description: flag.description(),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

pub fn handle_set(config: &Config, flag: Flag, enabled: bool) -> Result<()> {
    let store = config.open_store()?;
    store::save_flag(&store, flag, enabled)?;
    println!("{flag} = {}", on_off(enabled));
    Ok(())
}

pub fn handle_clear(config: &Config, flag: Flag) -> Result<()> {
    let store = config.open_store()?;
    if store::clear_flag(&store, flag)? {
        println!("{flag} cleared (now off)");
    } else {
        println!("{flag} was not set");
    }
    Ok(())
}
