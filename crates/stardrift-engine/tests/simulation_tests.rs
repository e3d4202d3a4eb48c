//! End-to-end tick behaviour: limits, collisions, immunity, emissions,
//! lifetimes, pausing and capacity.

use std::sync::Arc;

use parking_lot::Mutex;
use stardrift_core::physics::REBOUND_EPSILON;
use stardrift_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type EventLog = Arc<Mutex<Vec<Vec<DomainEvent>>>>;

/// Wrap `inner`, recording every batch it receives.
fn recording<G: ActionsGenerator + 'static>(mut inner: G) -> (impl ActionsGenerator, EventLog) {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let rules = move |events: &[DomainEvent], actions: &mut ActionBuffer| {
        sink.lock().push(events.to_vec());
        inner.provide_actions(events, actions);
    };
    (rules, log)
}

fn frictionless() -> SimulationConfig {
    SimulationConfig {
        world_width: 1000.0,
        world_height: 1000.0,
        ..SimulationConfig::frictionless()
    }
}

fn collisions(batch: &[DomainEvent]) -> Vec<(BodyId, BodyId, bool)> {
    batch
        .iter()
        .filter_map(|e| match e {
            DomainEvent::Collision {
                primary,
                secondary,
                immunity,
            } => Some((primary.id, secondary.id, *immunity)),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[test]
fn crossing_west_edge_rebounds_inside() {
    let mut sim = Simulation::new(frictionless(), LimitRebound).unwrap();
    let rock = sim
        .add_body(BodySpec::dynamic("rock", 1.0, 100.0, 2.0).with_speed(-120.0, 0.0))
        .unwrap();

    let diag = sim.tick();
    assert_eq!(diag.events, 1);
    assert_eq!(diag.apply.applied, 1);

    let state = sim.world().get(rock).unwrap().physics();
    assert_eq!(state.pos_x, REBOUND_EPSILON);
    assert_eq!(state.speed_x, 120.0);
    assert_eq!(state.pos_y, 100.0);
}

#[test]
fn corner_crossing_reports_both_edges() {
    let (rules, log) = recording(LimitRebound);
    let mut sim = Simulation::new(frictionless(), rules).unwrap();
    let rock = sim
        .add_body(BodySpec::dynamic("rock", 999.0, 1.0, 2.0).with_speed(120.0, -120.0))
        .unwrap();
    sim.tick();

    let batch = log.lock()[0].clone();
    let edges: Vec<_> = batch
        .iter()
        .filter_map(|e| match e {
            DomainEvent::LimitReached { edge, .. } => Some(*edge),
            _ => None,
        })
        .collect();
    assert_eq!(edges, vec![LimitEdge::East, LimitEdge::North]);

    let state = sim.world().get(rock).unwrap().physics();
    assert_eq!(state.pos_x, 1000.0 - REBOUND_EPSILON);
    assert_eq!(state.pos_y, REBOUND_EPSILON);
    assert_eq!((state.speed_x, state.speed_y), (-120.0, 120.0));
}

#[test]
fn leaving_the_world_is_fatal_except_for_players() {
    let mut sim = Simulation::new(frictionless(), DeadInLimitsPlayerImmunity).unwrap();
    let rock = sim
        .add_body(BodySpec::dynamic("rock", 1.0, 500.0, 2.0).with_speed(-120.0, 0.0))
        .unwrap();
    let ship = sim
        .add_body(BodySpec::player("ship", 1.0, 100.0, 2.0).with_speed(-120.0, 0.0))
        .unwrap();
    let diag = sim.tick().clone();

    assert_eq!(diag.apply.died, vec![rock]);
    assert_eq!(diag.apply.ignored, 1);
    assert!(!sim.world().contains(rock));
    assert!(sim.world().get(ship).unwrap().physics().pos_x < 0.0);
}

// ---------------------------------------------------------------------------
// Collisions
// ---------------------------------------------------------------------------

#[test]
fn overlapping_rocks_collide_once_and_die() {
    let (rules, log) = recording(ReboundCollisionPlayerImmunity);
    let mut sim = Simulation::new(frictionless(), rules).unwrap();
    let a = sim.add_body(BodySpec::dynamic("a", 100.0, 100.0, 10.0)).unwrap();
    let b = sim.add_body(BodySpec::dynamic("b", 105.0, 100.0, 10.0)).unwrap();
    let far = sim.add_body(BodySpec::dynamic("c", 300.0, 300.0, 10.0)).unwrap();

    let diag = sim.tick().clone();
    assert_eq!(collisions(&log.lock()[0]), vec![(a, b, false)]);
    assert_eq!(diag.apply.died, vec![a, b]);
    assert_eq!(sim.world().alive_count(), 1);
    assert!(sim.world().contains(far));
}

#[test]
fn radius_factor_shrinks_the_overlap_test() {
    let (rules, log) = recording(LimitRebound);
    let mut sim = Simulation::new(frictionless(), rules).unwrap();
    // Nominal radii touch at distance 10; with factor 0.9 the reach is 9.
    sim.add_body(BodySpec::dynamic("a", 100.0, 100.0, 10.0)).unwrap();
    sim.add_body(BodySpec::dynamic("b", 109.5, 100.0, 10.0)).unwrap();
    sim.tick();
    assert!(collisions(&log.lock()[0]).is_empty());
}

#[test]
fn players_survive_collisions_but_are_marked() {
    let mut sim = Simulation::new(frictionless(), ReboundCollisionPlayerImmunity).unwrap();
    let ship = sim.add_body(BodySpec::player("ship", 100.0, 100.0, 10.0)).unwrap();
    let rock = sim.add_body(BodySpec::dynamic("rock", 104.0, 100.0, 10.0)).unwrap();
    sim.tick();

    assert_eq!(sim.world().get(ship).unwrap().state(), BodyState::Collided);
    assert_eq!(sim.world().get(rock).unwrap().state(), BodyState::Collided);
    let snap = sim.snapshot();
    assert_eq!(snap.body(ship).unwrap().state, BodyState::Collided);
}

#[test]
fn static_bodies_are_hit_by_movers_only() {
    let (rules, log) = recording(LimitRebound);
    let mut sim = Simulation::new(frictionless(), rules).unwrap();
    let sun = sim.add_body(BodySpec::static_body("sun", 100.0, 100.0, 40.0)).unwrap();
    sim.add_body(BodySpec::static_body("moon", 110.0, 100.0, 10.0)).unwrap();
    sim.add_body(BodySpec::decorator("dust", 100.0, 100.0, 10.0)).unwrap();
    let rock = sim.add_body(BodySpec::dynamic("rock", 115.0, 100.0, 10.0)).unwrap();
    sim.tick();

    let found = collisions(&log.lock()[0]);
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|&(primary, _, _)| primary == rock));
    assert!(found.iter().any(|&(_, secondary, _)| secondary == sun));
}

#[test]
fn projectiles_ignore_their_shooter_for_a_while() {
    let (rules, log) = recording(DeadInLimitsPlayerImmunity);
    let mut sim = Simulation::new(frictionless(), rules).unwrap();
    let ship = sim.add_body(BodySpec::player("ship", 500.0, 500.0, 20.0)).unwrap();
    sim.equip_weapon(
        ship,
        EmitterConfig::single_shot(5.0, SpawnConfig::projectile("bullet", 4.0, 0.0)),
    )
    .unwrap();

    sim.control(ControlCommand::Player {
        body: ship,
        control: PlayerControl::Fire,
    })
    .unwrap();
    let first = sim.tick().clone();
    assert_eq!(first.apply.spawned.len(), 1);
    let shot = first.apply.spawned[0];
    assert_eq!(sim.world().get(shot).unwrap().shooter(), Some(ship));

    sim.tick();
    assert_eq!(collisions(&log.lock()[1]), vec![(ship, shot, true)]);
    assert!(sim.world().contains(shot));

    // Immunity lasts half a second.
    sim.run_ticks(40);
    assert!(!sim.world().contains(shot));
    assert!(sim.world().contains(ship));
    let lost_immunity = log
        .lock()
        .iter()
        .flat_map(|batch| collisions(batch))
        .any(|(_, secondary, immunity)| secondary == shot && !immunity);
    assert!(lost_immunity);
}

// ---------------------------------------------------------------------------
// Emissions
// ---------------------------------------------------------------------------

#[test]
fn triggered_emitter_spawns_unindexed_decorator() {
    let (rules, log) = recording(LimitRebound);
    let mut sim = Simulation::new(frictionless(), rules).unwrap();
    let vent = sim.add_body(BodySpec::static_body("vent", 200.0, 200.0, 10.0)).unwrap();
    sim.equip_emitter(
        vent,
        EmitterConfig::single_shot(10.0, SpawnConfig::particle("smoke", 2.0, 0.5)),
    )
    .unwrap();

    sim.tick();
    assert_eq!(sim.world().alive_count(), 1, "no request, no emission");

    sim.world().emitter_trigger(vent, 0).unwrap().fire();
    let diag = sim.tick().clone();
    assert_eq!(diag.apply.spawned.len(), 1);
    let smoke = diag.apply.spawned[0];
    let body = sim.world().get(smoke).unwrap();
    assert_eq!(body.body_type(), BodyType::Decorator);
    assert!(!sim.world().grid().contains(smoke));

    let kinds: Vec<_> = log.lock()[1]
        .iter()
        .filter_map(|e| match e {
            DomainEvent::EmitRequested { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![EmissionKind::Emitter]);
}

#[test]
fn thrusting_player_leaves_a_trail() {
    let mut sim = Simulation::new(frictionless(), LimitRebound).unwrap();
    let ship = sim.add_body(BodySpec::player("ship", 500.0, 500.0, 20.0)).unwrap();
    sim.equip_trail(
        ship,
        EmitterConfig::single_shot(60.0, SpawnConfig::particle("exhaust", 3.0, 0.2)),
    )
    .unwrap();

    sim.tick();
    assert_eq!(sim.world().alive_count(), 1);

    sim.control(ControlCommand::Player {
        body: ship,
        control: PlayerControl::ThrustOn,
    })
    .unwrap();
    let diag = sim.tick().clone();
    assert_eq!(diag.apply.spawned.len(), 1);
    assert_eq!(
        sim.world().get(diag.apply.spawned[0]).unwrap().asset_id(),
        "exhaust"
    );
}

#[test]
fn full_world_rejects_emissions() {
    let config = SimulationConfig {
        max_bodies: 1,
        ..frictionless()
    };
    let mut sim = Simulation::new(config, LimitRebound).unwrap();
    let vent = sim.add_body(BodySpec::static_body("vent", 200.0, 200.0, 10.0)).unwrap();
    sim.equip_emitter(
        vent,
        EmitterConfig::single_shot(10.0, SpawnConfig::particle("smoke", 2.0, 0.5)),
    )
    .unwrap();
    sim.world().emitter_trigger(vent, 0).unwrap().fire();

    let diag = sim.tick();
    assert_eq!(diag.apply.rejected_spawns, 1);
    assert_eq!(sim.world().alive_count(), 1);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn finite_lifetime_ends_in_death() {
    let mut sim = Simulation::new(frictionless(), LimitRebound).unwrap();
    let spark = sim
        .add_body(BodySpec::dynamic("spark", 50.0, 50.0, 1.0).with_max_life(Lifetime::Seconds(0.1)))
        .unwrap();

    sim.run_ticks(5);
    assert!(sim.world().contains(spark));
    let diag = sim.tick().clone();
    assert_eq!(diag.apply.died, vec![spark]);

    let snap = sim.snapshot();
    assert!(snap.body(spark).is_none());
    assert_eq!(snap.dead, 1);
    assert!(matches!(sim.world().get(spark), Err(CoreError::StaleBody { .. })));
}

#[test]
fn paused_body_stays_put_and_resumes_without_a_jump() {
    let mut sim = Simulation::new(frictionless(), LimitRebound).unwrap();
    let rock = sim
        .add_body(BodySpec::dynamic("rock", 100.0, 100.0, 2.0).with_speed(60.0, 0.0))
        .unwrap();

    sim.control(ControlCommand::PauseBody(rock)).unwrap();
    sim.run_ticks(10);
    assert_eq!(sim.world().get(rock).unwrap().physics().pos_x, 100.0);
    assert_eq!(sim.world().get(rock).unwrap().state(), BodyState::Paused);

    sim.control(ControlCommand::ResumeBody(rock)).unwrap();
    sim.tick();
    let x = sim.world().get(rock).unwrap().physics().pos_x;
    assert!((x - 101.0).abs() < 1e-6, "moved {x}");
}

#[test]
fn collided_body_can_be_paused_between_ticks() {
    let mut sim = Simulation::new(frictionless(), ReboundCollisionPlayerImmunity).unwrap();
    let ship = sim
        .add_body(BodySpec::player("ship", 500.0, 500.0, 20.0))
        .unwrap();
    sim.add_body(BodySpec::static_body("sun", 500.0, 500.0, 100.0))
        .unwrap();
    sim.tick();
    assert_eq!(sim.world().get(ship).unwrap().state(), BodyState::Collided);

    sim.control(ControlCommand::PauseBody(ship)).unwrap();
    assert_eq!(sim.world().get(ship).unwrap().state(), BodyState::Paused);

    let again = sim.control(ControlCommand::PauseBody(ship));
    assert!(matches!(
        again,
        Err(EngineError::Core(CoreError::InvalidState {
            state: BodyState::Paused,
            ..
        }))
    ));
    sim.control(ControlCommand::ResumeBody(ship)).unwrap();
    assert!(sim.control(ControlCommand::ResumeBody(ship)).is_err());
}

#[test]
fn world_definition_loads_equipment() {
    let json = r#"{ "bodies": [
        { "body_type": "Player", "asset_id": "ship", "x": 100.0, "y": 100.0, "size": 20.0,
          "weapons": [
            { "emission_rate": 4.0, "spawn": { "body_type": "Projectile", "asset_id": "b", "size": 2.0 } },
            { "emission_rate": 1.0, "unlimited_ammo": false, "max_ammo": 4, "reload_time": 1.0,
              "spawn": { "body_type": "Projectile", "asset_id": "m", "size": 4.0 } }
          ] },
        { "asset_id": "rock", "x": 600.0, "y": 600.0, "size": 30.0, "max_life": 3.0 }
    ] }"#;
    let mut sim = Simulation::new(frictionless(), LimitRebound).unwrap();
    let ids = sim.load_world(&JsonWorldDefinition::new(json)).unwrap();
    assert_eq!(ids.len(), 2);

    let snap = sim.snapshot();
    assert_eq!(snap.players.len(), 1);
    assert_eq!(snap.players[0].weapons, 2);
    assert_eq!(snap.players[0].ammo_status, vec![1.0, 1.0]);
    assert_eq!(
        sim.world().get(ids[1]).unwrap().max_life(),
        Lifetime::Seconds(3.0)
    );

    let bad = r#"{ "bodies": [ { "asset_id": "rock", "weapons": [
        { "emission_rate": 1.0, "spawn": { "body_type": "Projectile", "asset_id": "b", "size": 1.0 } }
    ] } ] }"#;
    assert!(sim.load_world(&JsonWorldDefinition::new(bad)).is_err());
}

#[test]
fn rejected_world_definition_adds_nothing() {
    let json = r#"{ "bodies": [
        { "body_type": "Player", "asset_id": "ship", "x": 100.0, "y": 100.0, "size": 20.0 },
        { "asset_id": "rock", "x": 600.0, "y": 600.0, "size": 30.0,
          "weapons": [
            { "emission_rate": 4.0, "spawn": { "body_type": "Projectile", "asset_id": "b", "size": 2.0 } }
          ] }
    ] }"#;
    let mut sim = Simulation::new(frictionless(), LimitRebound).unwrap();
    let err = sim.load_world(&JsonWorldDefinition::new(json));
    assert!(matches!(
        err,
        Err(EngineError::Core(CoreError::InvalidConfig { .. }))
    ));
    assert_eq!(sim.world().alive_count(), 0);
    assert_eq!(sim.world().created_count(), 0);

    let bad_trail = r#"{ "bodies": [
        { "body_type": "Player", "asset_id": "ship", "x": 100.0, "y": 100.0, "size": 20.0 },
        { "body_type": "Player", "asset_id": "ship", "x": 200.0, "y": 100.0, "size": 20.0,
          "trail": { "emission_rate": 0.0, "spawn": { "body_type": "Decorator", "asset_id": "t", "size": 2.0 } } }
    ] }"#;
    assert!(sim.load_world(&JsonWorldDefinition::new(bad_trail)).is_err());
    assert_eq!(sim.world().alive_count(), 0);
}

#[test]
fn world_definition_larger_than_free_capacity_is_rejected() {
    let config = SimulationConfig {
        max_bodies: 2,
        ..frictionless()
    };
    let mut sim = Simulation::new(config, LimitRebound).unwrap();
    sim.add_body(BodySpec::dynamic("rock", 10.0, 10.0, 2.0)).unwrap();

    let json = r#"{ "bodies": [
        { "asset_id": "a", "x": 100.0, "y": 100.0, "size": 5.0 },
        { "asset_id": "b", "x": 200.0, "y": 100.0, "size": 5.0 }
    ] }"#;
    let err = sim.load_world(&JsonWorldDefinition::new(json));
    assert!(matches!(
        err,
        Err(EngineError::Core(CoreError::CapacityExhausted { max_bodies: 2 }))
    ));
    assert_eq!(sim.world().alive_count(), 1);
}
