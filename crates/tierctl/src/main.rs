//! tierctl - command-line driver for TierCache

mod commands;
mod demo;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::demo::Scenario;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run behavioural demo scenarios against in-process caches
    Demo {
        /// Scenario to run
        #[arg(short, long, value_enum, default_value_t = Scenario::All)]
        scenario: Scenario,
    },

    /// Validate a snapshot file and print its stats and entries
    Inspect {
        /// Snapshot written by `BoundedCache::save`
        snapshot: PathBuf,
    },

    /// Store a value in both tiers
    Put {
        #[command(flatten)]
        tier: TierArgs,
        /// Key
        key: String,
        /// Value
        value: String,
    },

    /// Read a value, promoting it from disk if needed
    Get {
        #[command(flatten)]
        tier: TierArgs,
        /// Key
        key: String,
    },

    /// Remove a key from both tiers
    Remove {
        #[command(flatten)]
        tier: TierArgs,
        /// Key
        key: String,
    },

    /// Report the durable tier's record count and size
    DiskUsage {
        /// Data directory
        #[arg(short, long, env = "TIERCTL_DIR", default_value = "./data")]
        data: PathBuf,
    },
}

/// Options shared by the one-shot tier commands
#[derive(clap::Args, Debug)]
pub struct TierArgs {
    /// Data directory (durable records plus the fast tier snapshot)
    #[arg(short, long, env = "TIERCTL_DIR", default_value = "./data")]
    pub data: PathBuf,

    /// Fast tier capacity (number of items)
    #[arg(short, long, env = "TIERCTL_CAPACITY", default_value_t = 10000)]
    pub capacity: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Demo { scenario } => demo::run(scenario),
        Command::Inspect { snapshot } => commands::inspect(&snapshot),
        Command::Put { tier, key, value } => commands::put(&tier, key, value),
        Command::Get { tier, key } => commands::get(&tier, key),
        Command::Remove { tier, key } => commands::remove(&tier, key),
        Command::DiskUsage { data } => commands::disk_usage(&data),
    }
}
