//! Determinism verification tests.
//!
//! Two airspaces built from the same seed and fed the same commands must
//! agree on every craft and every event, tick for tick. Randomness enters
//! through patrol destinations, dodge rolls, debris, plow-through rolls and
//! the spin picked when a craft starts falling.

use glam::{IVec3, Vec3};

use crate::airspace::Airspace;
use crate::config::MoverConfig;
use crate::craft::Regime;
use crate::entity::{CraftClass, CraftId, CraftStats};
use crate::event::CraftEvent;
use crate::mission::Mission;
use crate::terrain::{GridTerrain, Scenery};
use crate::world_view::Projectile;

use super::helpers::{Harness, MAP_SIZE};

// =============================================================================
// Scenario
// =============================================================================

/// Observable state of one craft.
#[derive(Debug, Clone, PartialEq)]
struct Trace {
    id: CraftId,
    position: Vec3,
    facing: f32,
    regime: Regime,
    health: i32,
}

fn traces(airspace: &Airspace) -> Vec<Trace> {
    airspace
        .crafts()
        .map(|c| Trace {
            id: c.id(),
            position: c.position,
            facing: c.facing,
            regime: c.regime(),
            health: c.health,
        })
        .collect()
}

fn city() -> GridTerrain {
    let mut terrain = GridTerrain::new(MAP_SIZE);
    terrain.fill_layer(0, Scenery::ground);
    for x in [4, 8, 12] {
        for z in 1..4 {
            terrain.set(IVec3::new(x, 6, z), Scenery::tower(z));
        }
    }
    terrain
}

/// Builds a busy airspace: patrollers, a craft going down over the
/// towers and a stream of projectiles for the dodgers.
fn busy_airspace(seed: u64) -> (Airspace, GridTerrain) {
    let mut terrain = city();
    let mut config = MoverConfig::default();
    config.dodge.chance_percent = 50;
    let mut airspace = Airspace::new(config, seed);

    let mut patrollers = Vec::new();
    for i in 0..4 {
        let id = airspace.spawn(
            format!("Patrol {i}"),
            CraftClass::Flying,
            CraftStats::default(),
            Vec3::new(2.5 + 3.0 * i as f32, 2.5, 5.5),
        );
        patrollers.push(id);
    }
    for id in &patrollers {
        airspace
            .add_mission(&mut terrain, *id, Mission::patrol(false, 4), true)
            .expect("patrol accepted");
    }

    let doomed_stats = CraftStats {
        crash_health: 60,
        ..CraftStats::default()
    };
    let doomed = airspace.spawn("Doomed", CraftClass::Flying, doomed_stats, Vec3::new(6.5, 6.5, 4.5));
    if let Some(craft) = airspace.get_mut(doomed) {
        craft.velocity = Vec3::new(3.0, 0.0, 0.0);
    }
    airspace.apply_damage(&mut terrain, doomed, 50, 0, Some(patrollers[0]));

    for i in 0..6 {
        let from = Vec3::new(0.5, 1.5 + 2.0 * i as f32, 5.5);
        airspace
            .projectiles_mut()
            .push(Projectile::new(from, Vec3::new(20.0, 0.0, 0.0), 400));
    }
    (airspace, terrain)
}

fn run(seed: u64, ticks: u32) -> (Vec<Trace>, Vec<CraftEvent>) {
    let (mut airspace, mut terrain) = busy_airspace(seed);
    let mut events = airspace.take_events();
    for _ in 0..ticks {
        events.extend(airspace.update(&mut terrain, 1));
    }
    (traces(&airspace), events)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn same_seed_same_run() {
    let (traces_a, events_a) = run(42, 1500);
    let (traces_b, events_b) = run(42, 1500);
    assert_eq!(traces_a, traces_b);
    assert_eq!(events_a, events_b);
}

#[test]
fn same_seed_same_run_in_coarse_steps() {
    let (mut a, mut terrain_a) = busy_airspace(9);
    let (mut b, mut terrain_b) = busy_airspace(9);
    for _ in 0..50 {
        let events_a = a.update(&mut terrain_a, 10);
        let events_b = b.update(&mut terrain_b, 10);
        assert_eq!(events_a, events_b);
        assert_eq!(traces(&a), traces(&b));
    }
}

#[test]
fn different_seeds_diverge() {
    let (traces_a, _) = run(1, 1500);
    let (traces_b, _) = run(2, 1500);
    assert_ne!(traces_a, traces_b);
}

#[test]
fn seed_is_recorded() {
    let (airspace, _) = busy_airspace(77);
    assert_eq!(airspace.seed(), 77);
}

#[test]
fn harness_runs_are_repeatable() {
    let trace = || {
        let mut h = Harness::open_sky();
        let id = h.spawn_flyer(Vec3::new(7.5, 7.5, 5.5));
        h.add_mission(id, Mission::patrol(false, 3), true).unwrap();
        h.update(600);
        traces(h.airspace())
    };
    assert_eq!(trace(), trace());
}
