//! Property tests of engine invariants.

use glam::{IVec3, Vec3};
use proptest::prelude::*;

use crate::craft::Regime;
use crate::mission::{Blockers, Mission};

use super::helpers::Harness;

fn config() -> ProptestConfig {
    ProptestConfig::with_cases(32)
}

proptest! {
    #![proptest_config(config())]

    /// Whatever the hits, a craft that is not under control refuses
    /// ordinary missions and the refusal leaves its queue alone.
    #[test]
    fn downed_craft_refuse_missions(
        hits in prop::collection::vec(1i32..40, 1..6),
        crash_health in 20i32..90,
        ticks in 0u32..30,
    ) {
        let mut h = Harness::open_sky();
        let id = h.spawn_flyer(Vec3::new(7.5, 7.5, 6.5));
        h.craft_mut(id).stats.crash_health = crash_health;
        for hit in hits {
            if h.damage(id, hit, 0) {
                return Ok(());
            }
        }
        h.update(ticks);
        let Some(craft) = h.get(id) else {
            return Ok(());
        };
        if !craft.is_alive() || craft.regime() == Regime::Controlled {
            return Ok(());
        }
        let before = craft.missions().clone();
        let expected = craft.blockers();
        prop_assert!(!expected.is_empty());
        for _ in 0..2 {
            let refused = h.add_mission(id, Mission::patrol(false, 1), true);
            prop_assert!(refused.is_err());
            prop_assert_eq!(h.craft(id).missions(), &before);
            prop_assert_eq!(h.craft(id).blockers(), expected);
        }
    }

    /// Exactly one regime applies, and the blockers agree with it.
    #[test]
    fn blockers_follow_regime(
        x in 1.0f32..14.0,
        y in 1.0f32..14.0,
        z in 2.0f32..9.0,
        hit in 0i32..150,
        ticks in 1u32..200,
    ) {
        let mut h = Harness::open_sky();
        let id = h.spawn_flyer(Vec3::new(x, y, z));
        h.craft_mut(id).stats.crash_health = 60;
        h.damage(id, hit, 0);
        h.update(ticks);
        if let Some(craft) = h.get(id) {
            let regime_blockers = craft.blockers() - Blockers::CARRIED;
            let expected = match craft.regime() {
                Regime::Controlled => Blockers::empty(),
                Regime::Falling => Blockers::FALLING,
                Regime::Sliding => Blockers::SLIDING,
                Regime::Crashed => Blockers::CRASHED,
            };
            prop_assert_eq!(regime_blockers, expected);
        }
    }

    /// A falling craft always stops falling: it lands, wrecks, or dies.
    #[test]
    fn falling_terminates(
        x in 1.0f32..14.0,
        y in 1.0f32..14.0,
        z in 1.5f32..9.5,
        vx in -5.0f32..5.0,
        vy in -5.0f32..5.0,
        vz in -2.0f32..2.0,
    ) {
        let mut h = Harness::open_sky();
        let id = h.spawn_flyer(Vec3::new(x, y, z));
        h.craft_mut(id).stats.crash_health = 99;
        h.craft_mut(id).velocity = Vec3::new(vx, vy, vz);
        h.damage(id, 1, 0);
        prop_assert_eq!(h.craft(id).regime(), Regime::Falling);

        h.run_until(20_000, |h| {
            h.get(id).map_or(true, |c| c.regime() != Regime::Falling)
        });
        prop_assert!(h.get(id).map_or(true, |c| c.regime() != Regime::Falling));
    }

    /// Motion budgets never exceed the ticks handed out.
    #[test]
    fn budgets_are_bounded(
        target_x in 0i32..16,
        target_y in 0i32..16,
        steps in prop::collection::vec(1u32..300, 1..8),
    ) {
        let mut h = Harness::open_sky();
        let id = h.spawn_flyer(Vec3::new(7.5, 7.5, 5.5));
        let target = IVec3::new(target_x, target_y, 5);
        h.add_mission(id, Mission::goto_location(target, h.config()), true)
            .unwrap();
        for ticks in steps {
            let report = h.update_one(id, ticks);
            prop_assert!(report.ticks_spent() <= ticks);
        }
    }
}
