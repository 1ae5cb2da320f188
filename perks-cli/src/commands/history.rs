//! History command - show recent ledger transactions

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(account_id: &str, limit: usize, json: bool) -> Result<()> {
    let ctx = get_context(account_id)?;
    let history = ctx.status_service.get_history(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        output::info("No transactions yet");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["When", "Kind", "Points", "Balance", "Reason", "Order"]);

    for tx in &history {
        let points = output::format_points(tx.points);
        let points = if tx.points > 0 {
            points.green().to_string()
        } else {
            points.red().to_string()
        };

        table.add_row(vec![
            tx.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            tx.kind.as_str().to_string(),
            points,
            tx.resulting_balance.to_string(),
            tx.reason.clone(),
            tx.order_id.clone().unwrap_or_default(),
        ]);
    }

    println!("{}", table);
    Ok(())
}
