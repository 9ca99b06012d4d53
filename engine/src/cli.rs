//! Command-line interface
//!
//! Defines the `troupe` binary's commands using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Troupe workflow engine
///
/// Runs multi-member AI workflows declared in a TOML or JSON configuration:
/// members and squads are graph nodes, and each node's output may steer the
/// run to its successor.
#[derive(Parser, Debug)]
#[command(name = "troupe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a workflow once
    Run {
        /// Path to the workflow configuration (.toml or .json)
        config: PathBuf,

        /// Input fed to the workflow's entry node
        #[arg(short, long)]
        input: String,
    },

    /// Run the workflow's declared regression tests
    Test {
        /// Path to the workflow configuration (.toml or .json)
        config: PathBuf,
    },

    /// Validate a workflow configuration without running it
    Check {
        /// Path to the workflow configuration (.toml or .json)
        config: PathBuf,
    },
}
