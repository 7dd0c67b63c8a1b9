use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use rapier3d::prelude::*;
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval};

use racenet::car::{GameVersion, VehicleDesc, placeholder_car};
use racenet::config::SimConfig;
use racenet::control::{Controller, RaceNet};
use racenet::logging;
use racenet::net::start_websocket_server;
use racenet::physics::PhysicsWorld;
use racenet::race::Race;
use racenet::spawn::SpawnGrid;
use racenet::state::SharedRaceState;

/// Rectangular loop: outer walls, inner island, starting grid on the +X
/// straight facing +Z.
fn build_demo_track(world: &mut PhysicsWorld) {
    world.add_ground(500.0, 0.0);

    let wall = 2.0;
    world.add_track_box(point![0.0, wall, 120.0], vector![60.0, wall, 0.5]);
    world.add_track_box(point![0.0, wall, -120.0], vector![60.0, wall, 0.5]);
    world.add_track_box(point![60.0, wall, 0.0], vector![0.5, wall, 120.0]);
    world.add_track_box(point![-60.0, wall, 0.0], vector![0.5, wall, 120.0]);
    world.add_track_box(point![0.0, wall, 0.0], vector![30.0, wall, 90.0]);

    info!("Demo track built");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = logging::try_init() {
        eprintln!("Logger already initialized: {e}");
    }

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(&path)?,
        None => SimConfig::default(),
    };
    info!("Starting racenet server at {} Hz", config.tick_rate_hz);

    let grid = SpawnGrid::new(Isometry::translation(45.0, 1.0, -60.0), 4.0, 8.0);
    let mut race = Race::with_grid(config.clone(), grid);
    build_demo_track(race.world_mut());

    {
        let mut rng = rand::thread_rng();
        let (best, loaded) = RaceNet::load_or_random(&config.weights_path, &mut rng);
        for i in 0..config.learned_vehicles {
            let net = if loaded { best.clone() } else { RaceNet::random(&mut rng) };
            let mut desc = VehicleDesc::new(
                format!("learner {i}"),
                GameVersion::Nfs4,
                placeholder_car(),
                Controller::learned(net),
            );
            desc.population_id = u32::try_from(i).ok();
            race.add_vehicle(desc).context("spawning learned vehicle")?;
        }
    }

    let race = Arc::new(Mutex::new(race));
    let state = Arc::new(Mutex::new(SharedRaceState::new()));

    let addr = config.listen_addr.clone();
    let server_race = Arc::clone(&race);
    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = start_websocket_server(&addr, server_race, server_state).await {
            error!("WebSocket server stopped: {e:#}");
        }
    });

    let mut ticker = interval(Duration::from_secs_f32(config.dt()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let snapshot = {
            let mut race = race.lock().await;
            race.tick();
            race.snapshot()
        };

        state.lock().await.broadcast_snapshot(&snapshot);
    }
}
