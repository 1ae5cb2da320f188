//! Redeem command - spend points on a reward

use anyhow::Result;
use dialoguer::Confirm;
use perks_core::domain::classify;

use super::get_context;
use crate::output;

pub fn run(account_id: &str, cost: i64, reason: &str, yes: bool, json: bool) -> Result<()> {
    let ctx = get_context(account_id)?;

    // Warn up front when this redemption would cost the current tier
    let account = ctx.ledger.account()?;
    let drops_tier = cost > 0
        && cost <= account.point_balance
        && classify(account.point_balance - cost).tier.rank() < account.tier.rank();

    if drops_tier && !yes && !json {
        output::warning(&format!(
            "This redemption drops you from {} to {}.",
            account.tier,
            classify(account.point_balance - cost).tier
        ));
        let proceed = Confirm::new()
            .with_prompt("Redeem anyway?")
            .default(false)
            .interact()?;
        if !proceed {
            output::info("Redemption cancelled");
            return Ok(());
        }
    }

    let tx = ctx.redemption_service.redeem(cost, reason)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        output::success(&format!(
            "Redeemed {} points for \"{}\". New balance: {} ({})",
            cost,
            reason,
            tx.resulting_balance,
            ctx.ledger.tier()?
        ));
    }
    Ok(())
}
