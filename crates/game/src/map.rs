use glam::Vec2;
use rand::Rng;

use crate::state::GameState;

const ROCK_MIN_RADIUS: f32 = 0.8;
const ROCK_MAX_RADIUS: f32 = 3.0;
const ROCK_FIELD_INNER: f32 = 15.0;
const ROCK_FIELD_OUTER: f32 = 90.0;
const HOSTILE_MIN_DISTANCE: f32 = 60.0;
const HOSTILE_MAX_DISTANCE: f32 = 140.0;

/// Populates a fresh authoritative state with the opening scenario: a
/// drifting rock field around the ship and a patrol of hostiles beyond
/// sight range. Placement draws from the state's own RNG, so a given seed
/// always produces the same field.
pub fn seed_scenario(state: &mut GameState, hostile_count: u32, rock_count: u32) {
    for _ in 0..rock_count {
        let angle = state.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = state.rng.gen_range(ROCK_FIELD_INNER..ROCK_FIELD_OUTER);
        let radius = state.rng.gen_range(ROCK_MIN_RADIUS..ROCK_MAX_RADIUS);
        state.spawn_rock(Vec2::from_angle(angle) * distance, radius);
    }

    for _ in 0..hostile_count {
        let angle = state.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = state.rng.gen_range(HOSTILE_MIN_DISTANCE..HOSTILE_MAX_DISTANCE);
        let heading = state.rng.gen_range(0.0..std::f32::consts::TAU);
        state.spawn_hostile(Vec2::from_angle(angle) * distance, heading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_deterministic_per_seed() {
        let mut a = GameState::new(17);
        let mut b = GameState::new(17);
        seed_scenario(&mut a, 3, 12);
        seed_scenario(&mut b, 3, 12);

        assert_eq!(a.rocks.len(), 12);
        assert_eq!(a.hostiles.len(), 3);
        for (id, rock) in &a.rocks {
            let other = &b.rocks[id];
            assert_eq!(rock.radius, other.radius);
            let pa = a.physics.readout(rock.body).unwrap().position;
            let pb = b.physics.readout(other.body).unwrap().position;
            assert_eq!(pa, pb);
        }
    }

    #[test]
    fn hostiles_start_out_of_sight() {
        let mut state = GameState::new(17);
        seed_scenario(&mut state, 4, 0);

        for hostile in state.hostiles.values() {
            let position = state.physics.readout(hostile.body).unwrap().position;
            assert!(position.length() >= HOSTILE_MIN_DISTANCE - 1.0);
        }
    }
}
