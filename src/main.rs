//! Raidscope - streaming chat client for the raid analysis agent
//!
#![doc = "Raidscope - streaming chat client for the raid analysis agent"]
#![doc = "Main entry point for the raidscope application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use raidscope::cli::{Cli, Commands};
use raidscope::commands;
use raidscope::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { ask, link } => {
            if let Some(q) = &ask {
                tracing::debug!("Seeding chat with question: {}", q);
            }
            if let Some(l) = &link {
                tracing::debug!("Seeding chat from link: {}", l);
            }

            commands::chat::run_chat(config, ask, link).await?;
            Ok(())
        }
        Commands::Ask { question, json } => {
            tracing::info!("Asking a single question");
            commands::ask::run_ask(config, question, json).await?;
            Ok(())
        }
    }
}

// Logs go to stderr so they never interleave with the streamed answer.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "raidscope=debug"
    } else {
        "raidscope=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
