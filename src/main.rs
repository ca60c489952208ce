//! Tunnel Session - Entry Point
//!
//! Interactive driver for the session manager.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};

use tunnel_session::session::{Address, AddressKind};
use tunnel_session::status::StatusView;
use tunnel_session::{provider, Config, SessionManager, SessionManagerConfig, VERSION};

/// Tunnel Session - connect/disconnect a tunnel from the terminal
#[derive(Parser)]
#[command(name = "tunnel-session")]
#[command(version = VERSION)]
#[command(about = "Connection session manager for tunnel clients")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive session reading commands from stdin
    Run {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate an address and print what kind it is
    Check {
        /// Address to validate
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_session(config).await,
        Commands::Check { address } => check_address(&address),
    }
}

async fn run_session(config_path: Option<PathBuf>) -> Result<()> {
    // Load configuration
    let config = match &config_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    // Initialize tracing/logging
    tunnel_session::util::init_tracing(&config.logging)?;

    info!(
        version = VERSION,
        config_path = ?config_path,
        provider = ?config.provider.kind,
        "Starting Tunnel Session"
    );

    let provider = provider::from_config(&config.provider);
    let (manager, task) = SessionManager::spawn(SessionManagerConfig::from(&config.session), provider);

    manager
        .subscribe(|snapshot| {
            println!("{}", StatusView::from(snapshot));
            Ok(())
        })
        .await?;

    // Initialize metrics if enabled
    if config.metrics.enabled {
        tunnel_session::metrics::init_metrics(&config.metrics, manager.watch())?;
        info!(bind_addr = %config.metrics.bind_addr, "Metrics endpoint started");
    }
    if config.metrics.api_enabled {
        tunnel_session::metrics::start_api_server(config.metrics.api_bind_addr, manager.watch())
            .context("Failed to start status API")?;
    }

    println!("{}", StatusView::from(&manager.snapshot()));
    print_help();

    tokio::select! {
        result = command_loop(&manager) => {
            if let Err(e) = result {
                error!(error = %e, "Input error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    manager.shutdown();
    task.await.context("Session task panicked")?;

    info!("Session stopped");
    Ok(())
}

/// Read and apply commands until EOF or `quit`
async fn command_loop(manager: &SessionManager) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let argument = parts.next().unwrap_or("").trim().to_string();

        let result = match command {
            "" => continue,
            "connect" => manager.request_connect(argument).await,
            "disconnect" => manager.request_disconnect().await,
            "toggle" => {
                // Reuse the displayed address when none is typed
                let address = if argument.is_empty() {
                    manager.snapshot().address.map(|a| a.to_string()).unwrap_or_default()
                } else {
                    argument
                };
                manager.toggle(address).await
            }
            "status" => {
                println!("{}", StatusView::from(&manager.snapshot()));
                Ok(())
            }
            "quit" | "exit" => break,
            "help" => {
                print_help();
                Ok(())
            }
            other => {
                println!("Unknown command: {other}");
                Ok(())
            }
        };

        if let Err(e) = result {
            let alert = StatusView::alert_for(&e);
            println!("{}: {}", alert.title, alert.message);
        }
    }

    Ok(())
}

fn check_address(input: &str) -> Result<()> {
    let address = Address::parse(input).with_context(|| format!("Invalid address {input:?}"))?;
    let kind = match address.kind() {
        AddressKind::Ipv4(_) => "IPv4",
        AddressKind::Ipv6(_) => "IPv6",
        AddressKind::Hostname => "hostname",
    };
    println!("{address} ({kind})");
    Ok(())
}

fn print_help() {
    println!("Commands: connect <address> | disconnect | toggle [address] | status | help | quit");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
