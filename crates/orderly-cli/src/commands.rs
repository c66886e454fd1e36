use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "orderly")]
#[command(about = "Organize files through reviewable, replayable plans", long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of TRACING_LEVEL
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory and store a plan for organizing it
    Scan { path: PathBuf },
    /// Show a plan and its items, or list recent plans
    Show { plan_id: Option<String> },
    /// Approve a plan for execution
    Approve { plan_id: String },
    /// Execute an approved plan (safe to repeat)
    Execute { plan_id: String },
    /// Display the number of cached classifications
    CountCache,
    /// Remove every cached classification
    ClearCache,
    /// Print configuration values
    PrintConfig,
}
