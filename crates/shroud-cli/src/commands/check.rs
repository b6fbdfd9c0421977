//! Request filter command handlers
use anyhow::Result;
use shroud_core::filter::{classify, filter_urls};
use shroud_core::{Config, RequestFilter, SettingsMirror};

pub fn handle_check(config: &Config, urls: &[String]) -> Result<()> {
    let store = config.open_store()?;
    let mut mirror = SettingsMirror::new();
    mirror.load(&store);
    let snapshot = mirror.snapshot();
    let filter = RequestFilter::new()?;

    for url in urls {
        let categories: Vec<String> = classify(url).iter().map(ToString::to_string).collect();
        println!("{url}");
        println!(
            "  intercepted: {}",
            if filter.in_scope(url) { "yes" } else { "no" }
        );
        println!(
            "  categories:  {}",
            if categories.is_empty() {
                "-".to_string()
            } else {
                categories.join(", ")
            }
        );
        println!("  decision:    {}", filter.intercept(url, &snapshot));
    }

    Ok(())
}

pub fn handle_patterns() {
    for pattern in filter_urls() {
        println!("{pattern}");
    }
}
