//! Adjust command - manual point corrections

use anyhow::Result;
use perks_core::services::AppendRequest;

use super::get_context;
use crate::output;

pub fn run(account_id: &str, points: i64, reason: &str, json: bool) -> Result<()> {
    let ctx = get_context(account_id)?;

    let tx = ctx.ledger.append(AppendRequest::adjusted(points, reason))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        output::success(&format!(
            "Applied {} point adjustment. New balance: {}",
            output::format_points(points),
            tx.resulting_balance
        ));
    }
    Ok(())
}
