//! Background runner: ticking, control delivery, pausing and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use stardrift_engine::prelude::*;

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

fn sim_with_ship() -> (Simulation, BodyId) {
    let mut sim = Simulation::new(SimulationConfig::frictionless(), LimitRebound).unwrap();
    let ship = sim
        .add_body(BodySpec::player("ship", 500.0, 500.0, 20.0))
        .unwrap();
    sim.equip_weapon(
        ship,
        EmitterConfig::single_shot(50.0, SpawnConfig::projectile("bolt", 2.0, 100.0)),
    )
    .unwrap();
    (sim, ship)
}

#[test]
fn runner_ticks_and_publishes_snapshots() {
    let (sim, ship) = sim_with_ship();
    let handle = SimulationRunner::spawn(sim, Duration::from_millis(1));

    assert!(wait_until(Duration::from_secs(5), || handle.latest().tick >= 5));
    let latest = handle.latest();
    assert!(latest.body(ship).is_some());
    assert!(handle.ticks() >= 5);

    let sim = handle.stop().unwrap();
    assert!(sim.tick_count() >= 5);
}

#[test]
fn controls_are_applied_between_ticks() {
    let (sim, ship) = sim_with_ship();
    let handle = SimulationRunner::spawn(sim, Duration::from_millis(1));

    // A rejected command is logged and does not stop the loop.
    handle
        .send(ControlCommand::Player {
            body: BodyId::new(99, 0),
            control: PlayerControl::Fire,
        })
        .unwrap();
    handle
        .send(ControlCommand::Player {
            body: ship,
            control: PlayerControl::Fire,
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        handle.latest().bodies.iter().any(|b| b.asset_id == "bolt")
    }));
    let sim = handle.stop().unwrap();
    assert_eq!(sim.world().created_count(), 2);
}

#[test]
fn command_flood_does_not_starve_ticks() {
    let (sim, ship) = sim_with_ship();
    let handle = Arc::new(SimulationRunner::spawn(sim, Duration::from_millis(1)));
    let done = Arc::new(AtomicBool::new(false));

    let flood = {
        let handle = Arc::clone(&handle);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut sent = 0u64;
            while !done.load(Ordering::Relaxed) {
                let control = if sent % 2 == 0 {
                    PlayerControl::RotateLeft
                } else {
                    PlayerControl::RotateOff
                };
                if handle.send(ControlCommand::Player { body: ship, control }).is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        })
    };

    let ticked = wait_until(Duration::from_secs(5), || handle.ticks() >= 10);
    done.store(true, Ordering::Relaxed);
    assert!(flood.join().unwrap() > 0);
    assert!(ticked, "runner stalled behind queued commands");

    let handle = Arc::try_unwrap(handle).ok().unwrap();
    handle.stop().unwrap();
}

#[test]
fn pause_stops_the_clock() {
    let (sim, _) = sim_with_ship();
    let handle = SimulationRunner::spawn(sim, Duration::from_millis(1));
    assert!(wait_until(Duration::from_secs(5), || handle.ticks() >= 3));

    handle.send(ControlCommand::Pause).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        let before = handle.ticks();
        thread::sleep(Duration::from_millis(20));
        handle.ticks() == before
    }));
    let frozen = handle.latest().tick;

    handle.send(ControlCommand::Resume).unwrap();
    assert!(wait_until(Duration::from_secs(5), || handle.latest().tick > frozen));

    let sim = handle.stop().unwrap();
    assert!(!sim.is_paused());
}

#[test]
fn dropping_the_handle_stops_the_thread() {
    let (sim, _) = sim_with_ship();
    let handle = SimulationRunner::spawn(sim, Duration::from_millis(1));
    let board = handle.board();
    drop(handle);

    let tick = board.latest().tick;
    thread::sleep(Duration::from_millis(20));
    assert_eq!(board.latest().tick, tick);
}
