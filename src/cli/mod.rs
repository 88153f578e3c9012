//! Command-line interface

pub mod commands;
pub mod output;

use crate::core::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use commands::{CreateCommand, DestroyCommand, UpdateCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Provision interconnected clusters and mesh them together
#[derive(Debug, Parser, Clone)]
#[command(name = "meshup")]
#[command(version)]
#[command(about = "Provision clusters and join them into a network mesh", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Maximum concurrent invocations per step (0 = one per cluster)
    #[arg(long, global = true, default_value_t = 0)]
    pub max_parallel: usize,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create resources
    #[command(subcommand)]
    Create(CreateCommand),

    /// Destroy resources
    #[command(subcommand)]
    Destroy(DestroyCommand),

    /// Update resources
    #[command(subcommand)]
    Update(UpdateCommand),

    /// Validate the configuration file
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
