mod config;
mod server;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use config::ServerConfig;
use server::GameServer;

#[derive(Parser)]
#[command(name = "skiff-server")]
#[command(about = "Authoritative skiff game server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = skiff::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = 8)]
    max_clients: usize,

    #[arg(long, default_value_t = 30)]
    client_timeout_secs: u64,

    #[arg(long, default_value_t = 0x5349_4646, help = "World generation seed")]
    seed: u64,

    #[arg(long, default_value_t = 3)]
    hostiles: u32,

    #[arg(long, default_value_t = 24)]
    rocks: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = ServerConfig {
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout_secs),
        world_seed: args.seed,
        hostile_count: args.hostiles,
        rock_count: args.rocks,
        ..Default::default()
    };

    let mut server = GameServer::new(&bind_addr, config)?;
    log::info!("server started on {}", server.local_addr());
    server.run();
    log::info!("server shutting down");

    Ok(())
}
