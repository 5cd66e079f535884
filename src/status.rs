// Status display: configured targets, seen-item store, notification setup.

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::store::{SeenStore, StoreError};

/// Display monitor status to the terminal.
pub fn show(config: &Config) -> Result<()> {
    if config.targets.is_empty() {
        println!("Targets: {}", "none configured".yellow());
        println!("  Set FEEDWATCH_TARGETS in your .env file");
    } else {
        println!(
            "Targets: {} ({})",
            config.targets.len(),
            config.targets.join(", ")
        );
    }

    println!(
        "Schedule: every {}s, items from the last {} days, up to {} per target",
        config.interval.as_secs(),
        config.days_limit,
        config.max_items
    );

    let seen_display = config.seen_path.display();
    match SeenStore::load(&config.seen_path) {
        Ok(store) if store.is_empty() && !config.seen_path.exists() => {
            println!("Seen items: none yet ({seen_display} will be created on first run)");
        }
        Ok(store) => {
            let file_size = std::fs::metadata(&config.seen_path)
                .map(|m| format_bytes(m.len()))
                .unwrap_or_else(|_| "unknown".to_string());
            println!(
                "Seen items: {} recorded in {} ({})",
                store.len(),
                seen_display,
                file_size
            );
        }
        Err(e @ StoreError::Corrupt { .. }) => {
            println!("Seen items: {}", "unreadable".red());
            println!("  {e}");
            println!("  The next round starts from an empty set and rewrites the file");
        }
        Err(e) => return Err(e.into()),
    }

    println!("Browser service: {}", config.browserless_url);

    if config.telegram_configured() {
        println!(
            "Notifications: {} (chat {})",
            "Telegram".green(),
            config.telegram_chat_id
        );
    } else {
        println!("Notifications: {}", "not configured".yellow());
        println!("  Set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID, or use --dry-run");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
