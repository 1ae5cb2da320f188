//! CLI command implementations

pub mod adjust;
pub mod demo;
pub mod history;
pub mod redeem;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use perks_core::PerksContext;

/// Get the perks directory from environment or default
pub fn get_perks_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PERKS_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(".perks")
    }
}

/// Get or create the perks context for an account
pub fn get_context(account_id: &str) -> Result<PerksContext> {
    let perks_dir = get_perks_dir();

    std::fs::create_dir_all(&perks_dir)
        .with_context(|| format!("Failed to create perks directory: {:?}", perks_dir))?;

    PerksContext::new(&perks_dir, account_id).context("Failed to initialize perks context")
}
