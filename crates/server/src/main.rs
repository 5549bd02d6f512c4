use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use skirmish::DEFAULT_PORT;
use skirmish_server::{ServerConfig, ServerSession};

#[derive(Parser, Debug)]
#[command(name = "skirmish-server", about = "Authoritative game session host")]
struct Args {
    /// Address to bind the UDP socket to.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Simulation ticks per second.
    #[arg(long, default_value_t = 30)]
    tick_rate: u32,

    #[arg(long, default_value_t = 16)]
    max_peers: usize,

    /// Seconds of silence before a peer is dropped.
    #[arg(long, default_value_t = 5.0)]
    timeout: f64,

    #[arg(long, default_value_t = 4)]
    vehicles: u32,

    #[arg(long, default_value = "deathmatch")]
    mode: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ServerConfig {
        bind_addr: args.bind,
        port: args.port,
        max_peers: args.max_peers,
        vehicle_count: args.vehicles,
        mode_name: args.mode,
        ..Default::default()
    };
    config.session.tick_rate = args.tick_rate;
    config.session.peer_timeout = Duration::from_secs_f64(args.timeout);

    let mut session = ServerSession::new(config).context("failed to start session")?;
    session.run().context("session loop failed")
}
