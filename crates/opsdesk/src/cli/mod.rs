//! Command-line interface for opsdesk.
//!
//! This module provides the CLI structure for the `opsdesk` binary. Each
//! invocation is one session: commands that touch collections log in first
//! with `--user`/`--password`.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_field, parse_value, record_from_fields, AddCommand, ConfigCommand, DeleteCommand,
    ListCommand, OutputFormat, UpdateCommand,
};

/// opsdesk - Role-gated record collections
///
/// Lists and edits the dashboard's collections (tasks, institutions,
/// partners, interns, bugs, ideas, campaigns, messages and work
/// assignments) with the rights of the logged-in user.
#[derive(Debug, Parser)]
#[command(name = "opsdesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Username to log in as
    #[arg(short, long, global = true, env = "OPSDESK_USER")]
    pub user: Option<String>,

    /// Password for --user
    #[arg(short, long, global = true, env = "OPSDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and show the resolved role
    Login,

    /// List the records of a collection
    List(ListCommand),

    /// Append a record to a collection
    Add(AddCommand),

    /// Replace the record at a position
    Update(UpdateCommand),

    /// Delete the record at a position
    Delete(DeleteCommand),

    /// Flip an assignment between pending and done
    Toggle {
        /// Position of the assignment
        index: usize,
    },

    /// Show work assignments with what you may do to each
    Assignments {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show who you are logged in as
    Whoami,

    /// Show your capabilities per collection
    Capabilities {
        /// Only this collection
        collection: Option<String>,
    },

    /// Show the last successful login
    LastAccess,

    /// Hash a password for the credential table
    HashPassword {
        /// The password to hash
        password: String,
    },

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Command {
    /// Check if the command needs a logged-in session.
    #[must_use]
    pub fn needs_login(&self) -> bool {
        !matches!(
            self,
            Self::LastAccess | Self::HashPassword { .. } | Self::Config(_)
        )
    }
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
