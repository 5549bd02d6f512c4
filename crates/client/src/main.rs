//! Headless client: connects, walks a scripted loop and reports what the
//! server tells it. Useful for soak-testing a session without a renderer.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use skirmish::{DEFAULT_PORT, FixedTimestep};
use skirmish_client::{ClientConfig, ClientSession, InputFrame};

#[derive(Parser, Debug)]
#[command(name = "skirmish-client", about = "Headless session client")]
struct Args {
    /// Server address to connect to.
    #[arg(long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    server: SocketAddr,

    #[arg(long, default_value_t = 30)]
    tick_rate: u32,

    /// How long to stay connected, in seconds.
    #[arg(long, default_value_t = 30.0)]
    duration: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ClientConfig {
        server_addr: args.server,
        tick_rate: args.tick_rate,
        ..Default::default()
    };
    let mut session = ClientSession::connect(config).context("failed to open client socket")?;

    let mut timestep = FixedTimestep::new(args.tick_rate);
    let stop_at = Instant::now() + Duration::from_secs_f64(args.duration);
    let mut last = Instant::now();

    while Instant::now() < stop_at {
        let now = Instant::now();
        timestep.accumulate((now - last).as_secs_f32());
        last = now;

        session
            .process_network()
            .context("client socket poll failed")?;
        while timestep.consume_tick() {
            session.step(&scripted_frame(session.tick()));
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    if let Some(character) = session.predicted_character() {
        log::info!(
            "disconnecting at tick {}, position {:?}",
            session.tick(),
            character.position()
        );
    }
    for row in session.scoreboard() {
        log::info!(
            "peer {}: {} kills / {} deaths",
            row.peer_id,
            row.kills,
            row.deaths
        );
    }
    Ok(())
}

/// Walk forward and sweep the view in a slow circle, jumping now and then.
fn scripted_frame(tick: u32) -> InputFrame {
    InputFrame {
        move_y: 1.0,
        view_yaw: (tick as f32) * 0.01,
        jump: tick % 90 == 0,
        sprint: (tick / 150) % 2 == 0,
        ..Default::default()
    }
}
