//! Command-line interface for dronegallery.
//!
//! This module provides the CLI structure for the `dgallery` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, RenderCommand, StatusCommand, WatchCommand};

/// dgallery - Live gallery of drone image captures
///
/// Follows a collection of captured image sets and renders them newest first,
/// announcing when a complete survey has come in.
#[derive(Debug, Parser)]
#[command(name = "dgallery")]
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

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the collection and present every change until Ctrl-C
    Watch(WatchCommand),

    /// Render the current collection once
    Render(RenderCommand),

    /// Show collection statistics
    Status(StatusCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
