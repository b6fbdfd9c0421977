mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shroud_core::{flags::parse_toggle, Config, Flag};

#[derive(Parser)]
#[command(name = "shroud")]
#[command(about = "Presence-signal blocking and notification privacy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show every flag and its stored value
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn a flag on or off
    Set {
        /// Flag key, e.g. block_seen or hide-sender
        flag: Flag,
        /// on/off, true/false, yes/no or 1/0
        #[arg(value_parser = parse_toggle)]
        value: bool,
    },
    /// Remove a flag's stored value so it falls back to off
    Clear {
        flag: Flag,
    },
    /// Evaluate URLs against the request filter
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// List the URL patterns the host should route through the filter
    Patterns,
    /// Preview the notification redaction classes
    Redact {
        /// Current class attribute of the notification element
        #[arg(short, long, default_value = "zadark")]
        classes: String,
        /// Print the injection script instead
        #[arg(long)]
        script: bool,
    },
    /// Follow flag changes live until Ctrl-C
    Watch {
        /// Print each change as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write a config file with the defaults
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .format_timestamp_secs()
    .init();

    match cli.command {
        Commands::Status { json } => commands::flags::handle_status(&config, json),
        Commands::Set { flag, value } => commands::flags::handle_set(&config, flag, value),
        Commands::Clear { flag } => commands::flags::handle_clear(&config, flag),
        Commands::Check { urls } => commands::check::handle_check(&config, &urls),
        Commands::Patterns => {
            commands::check::handle_patterns();
            Ok(())
        }
        Commands::Redact { classes, script } => {
            commands::redact::handle_redact(&config, &classes, script)
        }
        Commands::Watch { json } => commands::watch::handle_watch(&config, json).await,
        Commands::Config { init } => commands::config::handle_config(&config, init),
    }
}
