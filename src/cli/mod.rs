//! Command-line interface for trackbeat
//!
//! `serve` runs the HTTP surface; the `subscriptions` commands manage the
//! provider-side webhook registration without going through the server.

use crate::Result;
use crate::config::Config;
use crate::model::Provider;
use crate::webhook::SubscriptionManager;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "trackbeat", about = "OAuth and webhook service for a personal site", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Server host
        #[arg(long)]
        host: Option<String>,
        /// Server port
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Manage provider webhook subscriptions
    Subscriptions {
        #[command(subcommand)]
        command: SubscriptionCommands,
    },
}

#[derive(Subcommand)]
enum SubscriptionCommands {
    /// List registered subscriptions
    List {
        /// Provider name (only strava supports subscriptions)
        #[arg(long, default_value = "strava")]
        provider: String,
    },
    /// Register this deployment's callback URL
    Create {
        #[arg(long, default_value = "strava")]
        provider: String,
    },
    /// Delete the registered subscription
    Delete {
        #[arg(long, default_value = "strava")]
        provider: String,
    },
}

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.http.host = host;
            }
            if let Some(port) = port {
                config.http.port = port;
            }
            crate::http::start_server(config).await
        }
        Commands::Subscriptions { command } => {
            let manager = SubscriptionManager::new(Arc::new(config))?;
            match command {
                SubscriptionCommands::List { provider } => {
                    let provider: Provider = provider.parse()?;
                    let subscriptions = manager.list(provider).await?;
                    println!("{}", serde_json::to_string_pretty(&subscriptions)?);
                    Ok(())
                }
                SubscriptionCommands::Create { provider } => {
                    let provider: Provider = provider.parse()?;
                    let subscription = manager.create(provider).await?;
                    println!("{}", serde_json::to_string_pretty(&subscription)?);
                    Ok(())
                }
                SubscriptionCommands::Delete { provider } => {
                    let provider: Provider = provider.parse()?;
                    manager.delete(provider).await?;
                    println!("Subscription deleted");
                    Ok(())
                }
            }
        }
    }
}
