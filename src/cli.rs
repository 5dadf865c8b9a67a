//! Command-line interface definition for Raidscope
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the interactive streaming chat and a one-shot question command.

use clap::{Parser, Subcommand};

/// Raidscope - talk to the raid combat-log analysis agent
///
/// Ask natural-language questions about raid performance and watch the
/// answer stream in.
#[derive(Parser, Debug, Clone)]
#[command(name = "raidscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the analysis service base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Raidscope
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive streaming chat with the analysis agent
    Chat {
        /// Question to send as soon as the chat opens
        #[arg(short, long)]
        ask: Option<String>,

        /// Chat view URL whose deep-link parameter carries the first question
        ///
        /// The parameter name comes from `chat.deep_link_param` (default `q`),
        /// e.g. `https://raids.example.com/chat?q=Who+died+first`.
        #[arg(short, long, conflicts_with = "ask")]
        link: Option<String>,
    },

    /// Ask a single question through the non-streaming endpoint
    Ask {
        /// The question to ask
        question: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            api_base: None,
            command: Commands::Chat {
                ask: None,
                link: None,
            },
        }
    }
}
