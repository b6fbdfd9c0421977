//! Live view of flag changes
use anyhow::Result;
use shroud_core::{Config, Flag, MirrorSnapshot, PrivacyGuard};
use shroud_storage::CookieJar;
use std::sync::Arc;
use std::time::Duration;

use super::on_off;

/// How often the store is checked for writes from other processes
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn handle_watch(config: &Config, json: bool) -> Result<()> {
    let store = Arc::new(config.open_store()?);
    let (guard, mut sync) = PrivacyGuard::start(store.clone(), config)?;
    let mut transitions = sync.transitions();

    if !json {
        println!(
            "Watching {} (Ctrl-C to stop)",
            config.database_path().display()
        );
    }
    print_snapshot(&guard.snapshot(), json)?;

    let sync_task = tokio::spawn(sync.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
        }
    }));
    let poller = tokio::spawn(poll_store(store));

    // Ends once the sync task stops and drops its senders
    while let Some(transition) = transitions.recv().await {
        print_change(transition.flag, transition.enabled, json)?;
    }

    poller.abort();
    let last = sync_task.await?;
    log::info!("Stopped watching, final state: {last:?}");
    Ok(())
}

async fn poll_store(store: Arc<CookieJar>) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = store.refresh() {
            log::warn!("Failed to poll cookie store: {e}");
        }
    }
}

fn print_snapshot(snapshot: &MirrorSnapshot, json: bool) -> Result<()> {
    for (flag, enabled) in snapshot.iter() {
        print_change(flag, enabled, json)?;
    }
    Ok(())
}

fn print_change(flag: Flag, enabled: bool, json: bool) -> Result<()> {
    if json {
        let line = serde_json::json!({ "flag": flag.key(), "enabled": enabled });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        println!("{:<14} {}", flag.key(), on_off(enabled));
    }
    Ok(())
}
