//! Perks CLI - loyalty points in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{adjust, demo, history, redeem, status, watch};

/// Perks - loyalty points in your terminal
#[derive(Parser)]
#[command(name = "pk", version, about, long_about = None)]
struct Cli {
    /// Account to operate on
    #[arg(long, global = true, env = "PERKS_ACCOUNT", default_value = "default")]
    account: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show balance, tier and progress
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent transactions
    History {
        /// Maximum entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Redeem points for a reward
    Redeem {
        /// Point cost of the reward
        cost: i64,
        /// Reason recorded in the ledger
        reason: String,
        /// Skip the tier-downgrade confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manually adjust the balance (support corrections)
    Adjust {
        /// Signed point delta
        points: i64,
        /// Reason recorded in the ledger
        reason: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Follow the realtime channel and apply events as they arrive
    Watch {
        /// Use the built-in demo feed instead of a live channel
        #[arg(long)]
        demo: bool,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(&cli.account, json),
        Commands::History { limit, json } => history::run(&cli.account, limit, json),
        Commands::Redeem {
            cost,
            reason,
            yes,
            json,
        } => redeem::run(&cli.account, cost, &reason, yes, json),
        Commands::Adjust {
            points,
            reason,
            json,
        } => adjust::run(&cli.account, points, &reason, json),
        Commands::Watch { demo } => watch::run(&cli.account, demo),
        Commands::Demo { command } => demo::run(command),
    }
}
