//! CLI module for the cached repository
//!
//! Operator commands against the configured storage backend:
//! - `get`: inspect one cached row without calling any provider
//! - `remove` / `invalidate`: drop one row or a related group
//! - `count`: number of rows for the selected kind
//! - `init`: connect and create tables for every configured kind

pub mod commands;

use clap::{Parser, Subcommand};

use crate::domain::storage::DEFAULT_KIND;

/// Cached repository - inspect and maintain cached rows
#[derive(Parser)]
#[command(name = "cached-repository")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Row kind whose storage the command operates on
    #[arg(long, global = true, default_value = DEFAULT_KIND)]
    pub kind: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the cached row for a serialized key
    Get { serialized_key: String },

    /// Remove the row for a serialized key
    Remove { serialized_key: String },

    /// Remove every row sharing a related key
    Invalidate { related_key: String },

    /// Count stored rows
    Count,

    /// Create tables for all configured kinds
    Init,
}
