#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use height_gateway::config::GatewayConfig;
use height_gateway::server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "height-gateway", about = "Height-aware blockchain routing gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file and exit.
    Init {
        /// Path to write the config file to
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Start the gateway, serving all configured protocol listeners.
    Start {
        /// Path to gateway config file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Admin API listen address (for health/metrics)
        #[arg(long, default_value = "0.0.0.0:9091")]
        admin_listen: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init { config } => {
            GatewayConfig::generate_default(&config)?;
            println!("wrote default config to {}", config.display());
            Ok(())
        }
        Command::Start {
            config,
            admin_listen,
        } => {
            let worker_threads = server::runtime::get_container_cpu_limit();

            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(worker_threads)
                .enable_all()
                .build()?;

            rt.block_on(server::bootstrap::run(server::bootstrap::BootstrapArgs {
                config_path: config,
                admin_listen,
            }))
        }
    }
}
