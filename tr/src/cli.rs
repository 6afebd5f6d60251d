//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ToolRelay - tool execution runtime
#[derive(Parser)]
#[command(
    name = "tr",
    about = "Registry-backed tool execution for tool-using model conversations",
    version,
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive tool-using conversation
    Chat {
        /// Restrict the conversation to these tools (repeatable;
        /// NAME or NAME:VERSION)
        #[arg(short, long = "tool", value_name = "NAME[:VERSION]")]
        tool: Vec<String>,

        /// Override the default system prompt
        #[arg(long)]
        system_prompt: Option<String>,
    },

    /// List the tools the configured source provides
    Tools,

    /// Check script runtime availability
    Env {
        /// Discard cached probe results and reprobe
        #[arg(short, long)]
        force: bool,
    },
}

/// Default log file location, for the startup banner
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolrelay")
        .join("logs")
        .join("toolrelay.log")
}
