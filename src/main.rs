//! Deck Presence - Discord Rich Presence over the local IPC socket.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deck_presence::bridge;
use deck_presence::config::{ConfigLoader, PresenceConfig};
use deck_presence::presence::{GameDetails, Presence};

#[derive(Parser)]
#[command(
    name = "deck-presence",
    about = "Discord Rich Presence over the local IPC socket",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to load instead of the default search paths.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-line requests from a host on stdin/stdout.
    Bridge,
    /// Show an activity until interrupted.
    Set {
        /// Steam app id.
        #[arg(long)]
        app_id: String,
        /// Game name shown as "Playing <name>".
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "Game")]
        action_type: String,
        #[arg(long, default_value = "start")]
        action: String,
    },
    /// Check that Discord answers on the IPC socket.
    Ping,
}

fn init_tracing(verbosity: u8, log_file: Option<&Path>) -> std::io::Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file)))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<PresenceConfig, deck_presence::config::ConfigError> {
    match path {
        Some(path) => ConfigLoader::with_path(path).load(),
        None => ConfigLoader::new().load(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let log_file = cli.log_file.or_else(|| config.log_file.clone());
    if let Err(e) = init_tracing(cli.verbose, log_file.as_deref()) {
        eprintln!("Failed to open log file: {e}");
        return ExitCode::FAILURE;
    }

    let presence = Presence::new(&config);
    tracing::info!(
        socket = %config.socket_path().display(),
        client_id = %config.client_id,
        "Starting deck-presence"
    );

    match cli.command {
        Commands::Bridge => {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = bridge::run(&presence, stdin, tokio::io::stdout()).await {
                tracing::error!(error = %e, "Bridge failed");
                return ExitCode::FAILURE;
            }
        }
        Commands::Set {
            app_id,
            name,
            action_type,
            action,
        } => {
            let details = GameDetails::new(name);
            if !presence
                .update_activity(&action_type, &app_id, &action, &details)
                .await
            {
                eprintln!("Failed to set activity; is Discord running?");
                presence.stop().await;
                return ExitCode::FAILURE;
            }
            println!("Playing {} (Ctrl-C to clear)", details.display_name);

            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            presence.clear_activity(&app_id).await;
            presence.stop().await;
        }
        Commands::Ping => {
            let connected = presence.start().await && presence.reconnect().await;
            presence.stop().await;
            if connected {
                println!("Connected to Discord");
            } else {
                println!("Discord not reachable");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
