//! CLI interface for capguard
//!
//! Provides subcommands for:
//! - `run`: Start the risk engine monitoring loop
//! - `config`: Show the effective configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "capguard")]
#[command(about = "Position risk and capital protection engine for automated trading")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the risk engine monitoring loop
    Run(RunArgs),
    /// Show the effective configuration
    Config,
}
