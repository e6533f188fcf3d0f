//! Command-line interface definition
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for serving the API, inspecting stored chat
//! sessions, and validating configuration.

use clap::{Parser, Subcommand};

/// Workdesk - workspace file manager and AI chat assistant server
#[derive(Parser, Debug, Clone)]
#[command(name = "workdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the bind address from config
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port from config
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect stored chat sessions
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Configuration utilities
    Config {
        /// Config subcommand
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Session inspection subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List stored sessions for a user
    List {
        /// User id to list sessions for
        #[arg(short, long)]
        user: String,
    },

    /// Delete a stored session
    Delete {
        /// User id owning the session
        #[arg(short, long)]
        user: String,

        /// Session id to delete
        id: String,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Load and validate the configuration file
    Validate,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
