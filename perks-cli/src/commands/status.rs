//! Status command - show balance, tier and progress

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(account_id: &str, json: bool) -> Result<()> {
    let ctx = get_context(account_id)?;
    let summary = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Loyalty Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Account", &summary.account_id]);
    table.add_row(vec!["Balance", &summary.point_balance.to_string()]);
    table.add_row(vec!["Tier", &summary.tier]);
    match &summary.next_tier {
        Some(next) => {
            table.add_row(vec![
                "Progress",
                &format!(
                    "{:.0}% to {} ({} points to go)",
                    summary.progress_percent, next, summary.points_to_next
                ),
            ]);
        }
        None => {
            table.add_row(vec!["Progress", "top tier reached"]);
        }
    }
    table.add_row(vec!["Total earned", &summary.total_earned.to_string()]);
    table.add_row(vec!["Total redeemed", &summary.total_redeemed.to_string()]);
    if summary.total_expired > 0 {
        table.add_row(vec!["Total expired", &summary.total_expired.to_string()]);
    }
    println!("{}", table);
    println!();

    println!("{}", "Benefits".bold());
    for benefit in &summary.benefits {
        println!("  - {}", benefit);
    }

    Ok(())
}
