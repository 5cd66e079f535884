use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use feedwatch::config::Config;
use feedwatch::feed::collector::FeedLayout;
use feedwatch::feed::Item;
use feedwatch::monitor::{Monitor, MonitorSettings, RoundReport};
use feedwatch::notify::telegram::TelegramTransport;
use feedwatch::notify::{Dispatcher, LogTransport, NotificationTransport};
use feedwatch::observe::{MonitorObserver, TracingObserver};
use feedwatch::session::browserless::BrowserlessSession;

/// Feedwatch: notify a chat when watched accounts post something new.
///
/// Renders each target's public feed in a headless browser, keeps the
/// posts from the last few days that haven't been seen before, and sends
/// them to Telegram newest first.
#[derive(Parser)]
#[command(name = "feedwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured targets until interrupted
    Run {
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single round and exit
    Once {
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show configuration and seen-item store status
    Status,

    /// Check the Telegram bot token
    VerifyBot,

    /// List chats that recently messaged the bot (to find TELEGRAM_CHAT_ID)
    ChatIds,

    /// Send a sample notification through the configured chat
    TestNotify {
        /// Source name shown in the sample
        #[arg(long, default_value = "feedwatch")]
        source: String,

        /// Body text of the sample
        #[arg(long, default_value = "Test notification <it works> & renders")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("feedwatch=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { dry_run } => {
            let config = Config::load()?;
            config.require_targets()?;
            let mut monitor = build_monitor(&config, dry_run)?;

            println!(
                "Watching {} target(s) every {}s. Press Ctrl-C to stop.",
                config.targets.len(),
                config.interval.as_secs()
            );

            let cancel = CancellationToken::new();
            spawn_shutdown_listener(cancel.clone());
            let rounds = monitor.run(cancel).await;
            info!(rounds, "Monitor stopped");
            println!("{}", format!("Stopped after {rounds} round(s).").dimmed());
        }

        Commands::Once { dry_run } => {
            let config = Config::load()?;
            config.require_targets()?;
            let mut monitor = build_monitor(&config, dry_run)?;

            let cancel = CancellationToken::new();
            spawn_shutdown_listener(cancel.clone());
            let report = monitor.run_round(&cancel).await?;
            print_report(&report);
        }

        Commands::Status => {
            let config = Config::load()?;
            feedwatch::status::show(&config)?;
        }

        Commands::VerifyBot => {
            let config = Config::load()?;
            config.require_bot_token()?;
            let telegram = telegram_transport(&config)?;
            let bot = telegram.verify().await?;
            println!(
                "{} {} (@{}, id {})",
                "Bot token OK:".green().bold(),
                bot.first_name,
                bot.username.as_deref().unwrap_or("-"),
                bot.id
            );
        }

        Commands::ChatIds => {
            let config = Config::load()?;
            config.require_bot_token()?;
            let telegram = telegram_transport(&config)?;
            let chats = telegram.recent_chats().await?;
            if chats.is_empty() {
                println!("No recent chats. Send your bot a message, then run this again.");
            }
            for chat in &chats {
                println!("  {:>16}  {:<10} {}", chat.id, chat.kind, chat.title);
            }
        }

        Commands::TestNotify { source, text } => {
            let config = Config::load()?;
            config.require_telegram()?;
            let dispatcher = Dispatcher::new(
                Box::new(telegram_transport(&config)?),
                config.telegram_chat_id.clone(),
                config.send_delay,
                observer(),
            );
            let now = Utc::now().naive_utc();
            let url = format!("{}/{}", config.feed_url.trim_end_matches('/'), source);
            let item = Item::new("test", &text, &url, &source, now)?;
            if dispatcher.send(&item).await {
                println!("{}", "Test notification sent.".green());
            } else {
                anyhow::bail!("Test notification was not delivered (see log for details)");
            }
        }
    }

    Ok(())
}

fn observer() -> Arc<dyn MonitorObserver> {
    Arc::new(TracingObserver)
}

fn telegram_transport(config: &Config) -> Result<TelegramTransport> {
    TelegramTransport::new(
        &config.telegram_api_url,
        Some(config.telegram_bot_token.as_str()),
    )
}

fn build_monitor(config: &Config, dry_run: bool) -> Result<Monitor> {
    let observer = observer();

    let transport: Box<dyn NotificationTransport> = if dry_run {
        Box::new(LogTransport)
    } else {
        if !config.telegram_configured() {
            warn!("Telegram is not configured; new items will be recorded but not sent");
        }
        Box::new(telegram_transport(config)?)
    };
    let dispatcher = Dispatcher::new(
        transport,
        config.telegram_chat_id.clone(),
        config.send_delay,
        observer.clone(),
    );

    let session = BrowserlessSession::new(
        &config.browserless_url,
        config.browserless_token.as_deref(),
    )?;

    let settings = MonitorSettings {
        targets: config.targets.clone(),
        interval: config.interval,
        days_limit: config.days_limit,
        max_items: config.max_items,
        max_scroll_attempts: config.max_scroll_attempts,
        settle_delay: config.scroll_settle,
        seen_path: config.seen_path.clone(),
        capture_dir: Some(config.capture_dir.clone()),
    };

    Ok(Monitor::new(
        Box::new(session),
        FeedLayout::with_base_url(&config.feed_url),
        dispatcher,
        settings,
        observer,
    ))
}

/// Cancel `cancel` on Ctrl-C, or SIGTERM where available.
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl-C only");
                    let _ = ctrl_c.await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        eprintln!("\nShutdown signal received, finishing up...");
        cancel.cancel();
    });
}

fn print_report(report: &RoundReport) {
    for source in &report.sources {
        println!(
            "  {:<20} {} collected, {} in window, {} new ({:?})",
            source.source, source.collected, source.in_window, source.fresh, source.stop
        );
    }
    if report.cancelled {
        println!("{}", "Round cancelled before sending; nothing saved.".yellow());
    } else {
        println!(
            "{}",
            format!(
                "{} new item(s), {} delivered.",
                report.dispatched.len(),
                report.delivered
            )
            .bold()
        );
    }
}
