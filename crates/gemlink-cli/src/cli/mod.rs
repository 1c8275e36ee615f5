//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use gemlink_core::config;
use gemlink_core::logging::{self, LogTarget};

mod commands;

#[derive(Parser)]
#[command(name = "gemlink")]
#[command(version)]
#[command(about = "Generative Language API relay and authentication status panel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sends one generateContent request through the relay
    Generate {
        /// Text prompt, wrapped into a single user turn
        #[arg(short, long, conflicts_with = "body", required_unless_present = "body")]
        prompt: Option<String>,

        /// Path to a JSON request body ("-" reads stdin)
        #[arg(short, long, value_name = "FILE")]
        body: Option<String>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Runs the relay over stdin/stdout (one JSON message per line)
    Relay,

    /// Shows the authentication status panel
    Panel {
        /// Initial status (loading, ready, failed, manual_required)
        #[arg(long, default_value = "loading")]
        status: String,

        /// Derive the status from a live request with the configured key
        #[arg(long)]
        check: bool,

        /// Model used by --check
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load().context("load config")?;

    // The panel owns the terminal, so its logs go to the file only.
    let target = match cli.command {
        Commands::Panel { .. } => LogTarget::FileOnly,
        _ => LogTarget::Stderr,
    };
    let _log_guard = logging::init(&config.log, target)?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli.command, config).await })
}

async fn dispatch(command: Commands, config: config::Config) -> Result<()> {
    match command {
        Commands::Generate {
            prompt,
            body,
            model,
        } => {
            commands::generate::run(commands::generate::GenerateOptions {
                prompt: prompt.as_deref(),
                body: body.as_deref(),
                model_override: model.as_deref(),
                config: &config,
            })
            .await
        }

        Commands::Relay => commands::relay::run(&config).await,

        Commands::Panel {
            status,
            check,
            model,
        } => {
            commands::panel::run(commands::panel::PanelOptions {
                status: &status,
                check,
                model_override: model.as_deref(),
                config: &config,
            })
            .await
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
