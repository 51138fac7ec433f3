use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;
use tokio::io::BufReader;
use log::{error, info, warn};

use lanrelay::config::Config;
use lanrelay::init_logger_with_level;
use lanrelay::network::handlers::TrafficLogger;
use lanrelay::network::service::console::run_console;
use lanrelay::network::{start_relay, RelayConfig, RelayError, RelayHub};

#[derive(Debug, StructOpt)]
#[structopt(name = "lanrelay", about = "TCP relay that mirrors each peer's bytes to every other peer")]
struct Opt {
    /// Configuration file
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[structopt(long)]
    host: Option<String>,

    /// Listen port, overrides the config file
    #[structopt(long)]
    port: Option<u16>,

    /// Log level, overrides the config file
    #[structopt(long)]
    log_level: Option<String>,

    /// Do not read operator commands from stdin
    #[structopt(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    let opt = Opt::from_args();

    let mut config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(host) = opt.host {
        config.network.listen_addr = host;
    }

    if let Some(port) = opt.port {
        config.network.listen_port = port;
    }

    if let Some(level) = opt.log_level {
        config.node.log_level = level;
    }

    if opt.no_console {
        config.node.admin_console = false;
    }

    init_logger_with_level(&config.node.log_level);

    info!("Starting {}...", config.node.node_name);

    let relay_config = RelayConfig::from_config(&config)?;
    let server = start_relay(relay_config).await?;
    let hub = server.hub();

    if config.node.log_traffic {
        hub.add_handler("traffic", TrafficLogger::new());
    }

    info!("{} relaying on {}", config.node.node_name, server.local_addr());

    if config.node.admin_console {
        tokio::select! {
            _ = console(hub.clone()) => info!("Console closed"),
            result = tokio::signal::ctrl_c() => log_signal(result),
        }
    } else {
        log_signal(tokio::signal::ctrl_c().await);
    }

    info!("Shutting down {}...", config.node.node_name);
    server.shutdown().await;

    // Live peers keep relaying until they leave
    let remaining = hub.peer_count();
    if remaining > 0 {
        info!("Waiting for {} peers to disconnect, press ctrl-c again to force exit", remaining);

        tokio::select! {
            _ = hub.wait_until_idle() => info!("All peers disconnected"),
            result = tokio::signal::ctrl_c() => {
                log_signal(result);
                warn!("Forcing exit with {} peers connected", hub.peer_count());
            }
        }
    }

    Ok(())
}

async fn console(hub: Arc<RelayHub>) {
    println!("Type 'help' for commands");

    if let Err(e) = run_console(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), hub).await {
        error!("Console error: {}", e);
    }
}

fn log_signal(result: std::io::Result<()>) {
    if let Err(e) = result {
        warn!("Failed to listen for ctrl-c: {}", e);
    }
}
