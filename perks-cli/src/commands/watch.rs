//! Watch command - follow the realtime channel and apply events live

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use indicatif::ProgressBar;
use perks_core::adapters::demo::DemoEventFeed;
use perks_core::ports::EventChannel;
use perks_core::services::{ChannelStatus, TierUpgrade};
use perks_core::PointTransaction;

use super::get_context;
use crate::output;

fn print_transaction(tx: &PointTransaction) {
    let points = output::format_points(tx.points);
    let points = if tx.points > 0 {
        points.green().to_string()
    } else {
        points.red().to_string()
    };
    println!(
        "{}  {}  {}  balance {}  {}",
        tx.timestamp.format("%H:%M:%S"),
        tx.kind.as_str(),
        points,
        tx.resulting_balance,
        tx.reason
    );
}

fn print_upgrade(upgrade: &TierUpgrade) {
    output::success(&format!(
        "Tier upgraded: {} -> {}",
        upgrade.from, upgrade.to
    ));
}

pub fn run(account_id: &str, demo: bool) -> Result<()> {
    let ctx = get_context(account_id)?;

    if !demo && !ctx.config.demo_mode {
        anyhow::bail!(
            "No live channel is configured in this build; run with --demo or enable demo mode (pk demo on)"
        );
    }

    let channel: Arc<dyn EventChannel> = Arc::new(DemoEventFeed::new(account_id));
    let reconciler = ctx.reconciler(channel)?;
    let mut upgrades = reconciler.subscribe_upgrades();
    let mut status_rx = reconciler.status();
    let mut applied = ctx.ledger.subscribe_transactions();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Connecting to loyalty channel...");
        spinner.enable_steady_tick(Duration::from_millis(120));

        let mut task = tokio::spawn(reconciler.run(shutdown_rx));
        let mut interrupted = false;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    let _ = shutdown_tx.send(true);
                    interrupted = true;
                    break;
                }
                joined = &mut task => {
                    joined?;
                    break;
                }
                Ok(()) = status_rx.changed() => {
                    match *status_rx.borrow() {
                        ChannelStatus::Connected => {
                            spinner.finish_and_clear();
                            output::info("Connected; watching for loyalty events (ctrl-c to stop)");
                        }
                        ChannelStatus::Disconnected => {
                            output::warning("Channel disconnected; retrying...");
                        }
                        ChannelStatus::Connecting => {}
                    }
                }
                Ok(tx) = applied.recv() => print_transaction(&tx),
                Ok(upgrade) = upgrades.recv() => print_upgrade(&upgrade),
            }
        }

        spinner.finish_and_clear();
        if interrupted {
            task.await?;
            output::info("Stopped watching");
        }

        // events that landed while the loop was exiting
        while let Ok(tx) = applied.try_recv() {
            print_transaction(&tx);
        }
        while let Ok(upgrade) = upgrades.try_recv() {
            print_upgrade(&upgrade);
        }

        anyhow::Ok(())
    })?;

    let summary = ctx.status_service.get_status()?;
    println!();
    output::info(&format!(
        "Balance: {} points ({})",
        summary.point_balance, summary.tier
    ));

    Ok(())
}
