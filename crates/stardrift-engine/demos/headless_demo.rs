//! Headless asteroid field.
//!
//! Loads a small world from JSON, runs it on the background runner for a
//! second while the player ship thrusts, turns and fires, then prints the
//! final counters and per-phase timings.
//!
//! Run with: `cargo run -p stardrift-engine --example headless_demo`
//! (set `RUST_LOG=debug` for per-tick logs).

use std::thread;
use std::time::Duration;

use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use stardrift_engine::prelude::*;

const WORLD: &str = r#"{
    "bodies": [
        {
            "body_type": "Player", "asset_id": "ship",
            "x": 1000.0, "y": 1000.0, "size": 40.0, "angle": 270.0,
            "weapons": [
                { "emission_rate": 8.0, "spawn": { "body_type": "Projectile", "asset_id": "bullet",
                  "size": 4.0, "speed": 900.0, "forward_offset": 30.0, "add_emitter_speed": true,
                  "max_life": { "Seconds": 2.0 } } },
                { "emission_rate": 1.0, "burst_size": 3, "burst_rate": 20.0,
                  "unlimited_ammo": false, "max_ammo": 6, "reload_time": 2.0,
                  "spawn": { "body_type": "Projectile", "asset_id": "missile",
                  "size": 8.0, "speed": 400.0, "forward_offset": 30.0 } }
            ],
            "trail": { "emission_rate": 30.0, "spawn": { "body_type": "Decorator",
                "asset_id": "exhaust", "size": 6.0, "forward_offset": -25.0,
                "random_size": true, "max_life": { "Seconds": 0.4 }, "random_life": true } }
        },
        { "body_type": "Static", "asset_id": "sun", "x": 1500.0, "y": 500.0, "size": 150.0 }
    ]
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SimulationConfig {
        rng_seed: 7,
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(config, ReboundCollisionPlayerImmunity)
        .context("building simulation")?;
    let ids = sim
        .load_world(&JsonWorldDefinition::new(WORLD))
        .context("loading world definition")?;
    let ship = ids[0];

    let mut rng = Pcg64::seed_from_u64(99);
    for i in 0..200 {
        let x = rng.gen_range(0.0..2000.0);
        let y = rng.gen_range(0.0..2000.0);
        let size = rng.gen_range(10.0..60.0);
        let spec = BodySpec::dynamic(&format!("asteroid_{}", i % 4), x, y, size)
            .with_speed(rng.gen_range(-80.0..80.0), rng.gen_range(-80.0..80.0))
            .with_angular_speed(rng.gen_range(-45.0..45.0));
        sim.add_body(spec)?;
    }

    let handle = SimulationRunner::spawn(sim, Duration::from_millis(16));
    let pilot = |control| handle.send(ControlCommand::Player { body: ship, control });

    pilot(PlayerControl::ThrustOn)?;
    pilot(PlayerControl::RotateRight)?;
    for step in 0..10 {
        pilot(PlayerControl::Fire)?;
        if step == 5 {
            pilot(PlayerControl::SelectNextWeapon)?;
        }
        thread::sleep(Duration::from_millis(100));
    }
    pilot(PlayerControl::StopPushing)?;

    let latest = handle.latest();
    println!(
        "tick {}: {} alive, {} created, {} destroyed",
        latest.tick, latest.alive, latest.created, latest.dead
    );
    if let Some(player) = latest.players.first() {
        println!("ammo per weapon: {:?}", player.ammo_status);
    }

    let sim = handle.stop()?;
    let stats = sim.spatial_statistics();
    println!(
        "grid: {} bodies, {} busy cells, {:.2} bodies/cell, ~{} pair checks",
        stats.tracked_bodies, stats.non_empty_cells, stats.avg_bodies_per_cell, stats.estimated_pair_checks
    );
    for phase in sim.profiling_statistics().phases {
        println!(
            "{:<10} n={:<5} avg={:.3}ms max={:.3}ms",
            phase.name, phase.count, phase.avg_ms, phase.max_ms
        );
    }
    println!("state hash: {}", sim.state_hash()?);
    Ok(())
}
