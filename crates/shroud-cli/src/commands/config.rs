//! Configuration command handlers
use anyhow::Result;
use shroud_core::config::config_path;
use shroud_core::Config;

pub fn handle_config(config: &Config, init: bool) -> Result<()> {
    let path = config_path()?;

    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display());
        } else {
            Config::default().save_to(&path)?;
            println!("Wrote default config to {}", path.display());
        }
        return Ok(());
    }

    println!("# {}", path.display());
    println!("# cookie store: {}", config.database_path().display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
