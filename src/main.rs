//! Proxy node agent.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────┐        ┌──────────────────────────────────────────┐
//!   │ remote panel │◀──────▶│ Controller (one per [[nodes]] entry)     │
//!   └──────────────┘  HTTP  │   start: node → users → tag → limiter    │
//!                           │          → rules → cert → node → users   │
//!                           │   jobs:  refresh / report / cert /       │
//!                           │          dynamic limit / online IPs      │
//!                           └───────┬──────────────────────┬───────────┘
//!                                   ▼                      ▼
//!                           ┌───────────────┐      ┌───────────────────┐
//!                           │ engine (Core) │─────▶│ LimiterRegistry   │
//!                           │ tables by tag │ tag  │ shared, by tag    │
//!                           └───────────────┘      └───────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use node_agent::config::{load_config, watcher::ConfigWatcher, AgentConfig};
use node_agent::engine::{Core, MemoryCore};
use node_agent::lifecycle::{build_controllers, wait_for_signal, ServiceGroup, Signal};
use node_agent::limiter::LimiterRegistry;
use node_agent::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "node-agent")]
#[command(about = "Runs proxy nodes managed by a remote panel", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "/etc/node-agent/config.toml")]
    config: PathBuf,

    /// Reload automatically when the configuration file changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("node-agent v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let mut updates = if cli.watch {
        let (watcher, rx) = ConfigWatcher::new(&cli.config);
        Some((watcher.run()?, rx))
    } else {
        None
    };

    let core: Arc<dyn Core> = Arc::new(MemoryCore::new());
    let limiters = Arc::new(LimiterRegistry::new());
    let mut services = ServiceGroup::new(build_controllers(&config, core.clone(), limiters.clone())?);
    services.start_all().await?;
    tracing::info!(nodes = services.len(), "All nodes started");

    loop {
        let next = tokio::select! {
            signal = wait_for_signal() => match signal? {
                Signal::Shutdown => None,
                Signal::Reload => Some(load_config(&cli.config)),
            },
            Some(new_config) = next_update(&mut updates) => Some(Ok(new_config)),
        };

        match next {
            None => break,
            Some(Ok(new_config)) => {
                let controllers = match build_controllers(&new_config, core.clone(), limiters.clone()) {
                    Ok(controllers) => controllers,
                    Err(e) => {
                        tracing::error!("Failed to build nodes: {}. Keeping current nodes.", e);
                        continue;
                    }
                };
                tracing::info!("Reloading nodes");
                match services.reload(controllers).await {
                    Ok(()) => tracing::info!(nodes = services.len(), "All nodes restarted"),
                    Err(e) => tracing::error!(
                        error = %e,
                        "Reload failed, no nodes running until the next reload"
                    ),
                }
            }
            Some(Err(e)) => {
                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
            }
        }
    }

    services.close_all().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn next_update(
    updates: &mut Option<(notify::RecommendedWatcher, mpsc::UnboundedReceiver<AgentConfig>)>,
) -> Option<AgentConfig> {
    match updates {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}
