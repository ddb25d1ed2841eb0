//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for peripherals and print the collection as it updates
    Scan {
        /// How long to scan, in seconds
        #[arg(short, long, default_value_t = 15)]
        duration: u64,

        /// Only scan for devices advertising one of these service UUIDs
        #[arg(short, long)]
        service: Vec<Uuid>,
    },
    /// Watch adapter state transitions as they happen
    State {
        /// How long to watch, in seconds
        #[arg(short, long, default_value_t = 30)]
        duration: u64,
    },
}
