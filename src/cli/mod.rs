//! CLI module - Command-line interface for podcast-console
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// podcast-console - Admin console for the episode production pipeline
#[derive(Parser)]
#[command(name = "podcast-console")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web console with live list sync
    #[command(alias = "daemon", alias = "web")]
    Serve,

    /// Create default config file
    Init,

    /// List episode records
    #[command(alias = "ls")]
    List {
        /// Column to sort by
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending instead of ascending
        #[arg(long, requires = "sort")]
        desc: bool,
    },

    /// Upload a PDF and wait for its scripts
    Submit {
        /// Episode name
        name: String,
        /// Path to the source PDF
        pdf: PathBuf,
    },

    /// Approve the generated scripts of a record
    Approve {
        /// Record ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Delete a record
    #[command(alias = "rm")]
    Delete {
        /// Record ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

pub use commands::*;
