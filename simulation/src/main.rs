//! netsim - Network Simulation Engine
//!
//! Serves the simulation over HTTP, or runs scenarios and one-off
//! operations from the command line.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use netsim_engine::{NetworkEngine, SeedTopology};
use netsim_logging::{LogConfig, NetsimSubscriberBuilder};
use netsim_simulation::{AppConfig, Scenario, Shape, ShapeBuilder, scenarios};
use netsim_storage::{JsonSnapshotStore, TopologyMirror, spawn_mirror};

#[derive(Parser)]
#[command(name = "netsim", about = "Network topology and packet-flow simulator", version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and event stream
    Serve {
        /// Address to listen on, overriding the configuration file
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Run a scripted scenario
    Scenario {
        #[arg(value_enum)]
        scenario: Scenario,
    },

    /// Ping between two devices of the demo network (or the restored snapshot)
    Ping { source: String, destination: String },

    /// Traceroute between two devices of the demo network (or the restored snapshot)
    Traceroute { source: String, destination: String },

    /// Generate a topology and show it
    Topology {
        #[arg(short, long, value_enum, default_value = "ring")]
        shape: Shape,

        /// Number of devices
        #[arg(short = 'n', long, default_value = "6")]
        devices: usize,

        /// Connection probability for the random shape
        #[arg(short = 'p', long, default_value = "0.4")]
        connection_prob: f64,

        /// Ping from the first device to the last after building
        #[arg(long)]
        ping: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    // One-shot commands stay quiet unless a configuration file says otherwise
    let log_config = match (&cli.command, &cli.config) {
        (Commands::Serve { .. }, _) | (_, Some(_)) => config.logging.clone(),
        _ => LogConfig::command_line(),
    };
    let mut logging = NetsimSubscriberBuilder::new().with_config(log_config);
    if cli.verbose {
        logging = logging.with_level("debug");
    }
    let _guard = logging.init()?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(config).await?;
        }
        Commands::Scenario { scenario } => {
            let report = scenarios::run(scenario, config.engine).await?;
            println!("{}", report.summary());
        }
        Commands::Ping { source, destination } => {
            let engine = open_engine(&config).await?;
            let packet = engine.ping(&source.into(), &destination.into()).await?;
            println!("{}", serde_json::to_string_pretty(&packet)?);
        }
        Commands::Traceroute { source, destination } => {
            let engine = open_engine(&config).await?;
            let hops = engine
                .traceroute(&source.clone().into(), &destination.clone().into())
                .await?;
            if hops.is_empty() {
                println!("No route from {source} to {destination}");
            }
            for (index, hop) in hops.iter().enumerate() {
                println!("{:>3}  {} -> {}", index + 1, hop.source, hop.destination);
            }
        }
        Commands::Topology {
            shape,
            devices,
            connection_prob,
            ping,
        } => {
            let plan = ShapeBuilder::new(devices).build(shape, connection_prob);
            println!("{}", plan.visualize());

            if ping {
                let engine = NetworkEngine::new(config.engine.with_seed(SeedTopology::Empty));
                let ids = plan.apply(&engine).await?;
                if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
                    let packet = engine.ping(first, last).await?;
                    println!("ping: {:?} over {} hop(s)", packet.status(), packet.hop_count());
                }
            }
        }
    }

    Ok(())
}

/// Engine for one-off commands: the demo network, replaced by the saved
/// snapshot when one is configured.
async fn open_engine(config: &AppConfig) -> anyhow::Result<NetworkEngine> {
    let engine = NetworkEngine::new(config.engine.clone().with_seed(SeedTopology::Demo));
    if let Some(path) = &config.storage.snapshot_path {
        let store = JsonSnapshotStore::open(path).await?;
        if let Some(snapshot) = store.load().await? {
            engine.restore(snapshot).await?;
        }
    }
    Ok(engine)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let engine = NetworkEngine::new(config.engine.clone());

    let mirror = match &config.storage.snapshot_path {
        Some(path) => {
            let store = Arc::new(
                JsonSnapshotStore::open(path)
                    .await
                    .with_context(|| format!("failed to open snapshot {}", path.display()))?,
            );
            if config.storage.restore_on_start {
                if let Some(snapshot) = store.load().await? {
                    let (devices, connections) = engine.restore(snapshot).await?;
                    info!(devices, connections, path = %path.display(), "Restored topology");
                }
            }
            Some(spawn_mirror(engine.clone(), store))
        }
        None => None,
    };

    netsim_api::serve(config.server.bind, engine, shutdown_signal()).await?;

    if let Some(mirror) = mirror {
        mirror.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
