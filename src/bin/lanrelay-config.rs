use std::path::PathBuf;
use structopt::StructOpt;
use lanrelay::config::{Config, DuplicatePolicy};
use lanrelay::init_logger;
use log::{error, info};

#[derive(Debug, StructOpt)]
#[structopt(name = "lanrelay-config", about = "Lanrelay configuration tool")]
struct Opt {
    /// Generate a default configuration
    #[structopt(long)]
    generate: bool,

    /// Output file
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Input file
    #[structopt(long, parse(from_os_str))]
    input: Option<PathBuf>,

    /// Node name
    #[structopt(long)]
    node_name: Option<String>,

    /// Listen address
    #[structopt(long)]
    listen_addr: Option<String>,

    /// Listen port
    #[structopt(long)]
    listen_port: Option<u16>,

    /// Duplicate address policy (replace, reject)
    #[structopt(long)]
    duplicate_policy: Option<String>,

    /// Enable the stdin admin console
    #[structopt(long)]
    admin_console: Option<bool>,

    /// Log every relayed payload
    #[structopt(long)]
    log_traffic: Option<bool>,
}

fn print_config(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(config_str) => println!("{}", config_str),
        Err(e) => {
            error!("Failed to serialize configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    init_logger();

    let opt = Opt::from_args();

    if opt.generate {
        let mut config = Config::default();

        if let Some(node_name) = opt.node_name {
            config.node.node_name = node_name;
        }

        if let Some(listen_addr) = opt.listen_addr {
            config.network.listen_addr = listen_addr;
        }

        if let Some(listen_port) = opt.listen_port {
            config.network.listen_port = listen_port;
        }

        if let Some(policy) = opt.duplicate_policy {
            config.network.duplicate_policy = match policy.as_str() {
                "replace" => DuplicatePolicy::Replace,
                "reject" => DuplicatePolicy::Reject,
                other => {
                    error!("Unknown duplicate policy: {}", other);
                    std::process::exit(1);
                }
            };
        }

        if let Some(admin_console) = opt.admin_console {
            config.node.admin_console = admin_console;
        }

        if let Some(log_traffic) = opt.log_traffic {
            config.node.log_traffic = log_traffic;
        }

        match opt.output {
            Some(output) => match config.save(&output) {
                Ok(()) => info!("Configuration saved to {:?}", output),
                Err(e) => {
                    error!("Failed to save configuration: {}", e);
                    std::process::exit(1);
                }
            },
            None => print_config(&config),
        }
    } else if let Some(input) = opt.input {
        match Config::load(&input) {
            Ok(config) => print_config(&config),
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let _ = Opt::clap().print_help();
        println!();
    }
}
