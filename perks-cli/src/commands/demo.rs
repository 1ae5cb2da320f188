//! Demo command - manage demo mode

use anyhow::Result;
use clap::Subcommand;
use perks_core::config::Config;

use super::get_perks_dir;
use crate::output;

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode
    On,
    /// Disable demo mode
    Off,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let perks_dir = get_perks_dir();
    std::fs::create_dir_all(&perks_dir)?;
    let mut config = Config::load(&perks_dir)?;

    match command {
        None => {
            output::info(&format!(
                "Demo mode is {}",
                if config.demo_mode { "on" } else { "off" }
            ));
        }
        Some(DemoCommands::On) => {
            config.enable_demo_mode();
            config.save(&perks_dir)?;
            output::success("Demo mode enabled; demo data lives in its own directory");
        }
        Some(DemoCommands::Off) => {
            config.disable_demo_mode();
            config.save(&perks_dir)?;
            output::success("Demo mode disabled");
        }
    }

    Ok(())
}
