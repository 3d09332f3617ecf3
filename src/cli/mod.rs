//! CLI module for actionflow
//!
//! A single `serve` subcommand runs the demo articles server, showing how
//! an action wires into an axum router.

pub mod serve;

use clap::{Parser, Subcommand};

/// Actionflow - grouped route handlers with pluggable async step chains
#[derive(Parser)]
#[command(name = "actionflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the demo articles server
    Serve,
}
