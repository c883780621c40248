use std::time::Instant;

use glam::Vec2;

use skiff::math::lerp_angle;
use skiff::{EntityId, GameState, Simulation};

use crate::game::ClientGame;
use crate::reconcile::ErrorMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCategory {
    Ship,
    Hostile,
    Rock,
    DebugBox,
}

/// One drawable pose. Positions already have the decaying error offset
/// backed out and are interpolated between the previous and current frame,
/// so a renderer can draw them as-is.
#[derive(Debug, Clone, Copy)]
pub struct BodyView {
    pub id: EntityId,
    pub category: BodyCategory,
    pub position: Vec2,
    pub angle: f32,
}

fn entity_ids(state: &GameState) -> Vec<(EntityId, BodyCategory)> {
    let mut ids = vec![(state.ship.id, BodyCategory::Ship)];
    ids.extend(state.hostiles.keys().map(|&id| (id, BodyCategory::Hostile)));
    ids.extend(state.rocks.keys().map(|&id| (id, BodyCategory::Rock)));
    ids.extend(
        state
            .debug_boxes
            .keys()
            .map(|&id| (id, BodyCategory::DebugBox)),
    );
    ids
}

fn view_one(
    sim: &Simulation,
    errors: &mut ErrorMap,
    alpha: f32,
    id: EntityId,
    category: BodyCategory,
) -> Option<BodyView> {
    let current_state = sim.current_state();
    let current = current_state
        .body_of(id)
        .and_then(|handle| current_state.physics.readout(handle))?;

    let previous_state = sim.previous_state();
    let previous = previous_state
        .body_of(id)
        .and_then(|handle| previous_state.physics.readout(handle))
        .unwrap_or(current);

    // previous pose uses the pre-decay offset, current the post-decay one,
    // so the correction bleeds in over successive render ticks
    let before = errors.get(id);
    errors.offset_mut(id).decay();
    let after = errors.get(id);

    let prev_position = previous.position - before.position;
    let curr_position = current.position - after.position;

    Some(BodyView {
        id,
        category,
        position: prev_position.lerp(curr_position, alpha),
        angle: lerp_angle(
            previous.angle - before.angle,
            current.angle - after.angle,
            alpha,
        ),
    })
}

/// One render tick: decays every error offset and returns interpolated,
/// offset-corrected poses for everything alive. Reads simulation state only;
/// the render cadence never mutates it.
pub fn render_tick(game: &mut ClientGame, now: Instant) -> Vec<BodyView> {
    let (sim, errors, alpha) = game.render_parts(now);
    entity_ids(sim.current_state())
        .into_iter()
        .filter_map(|(id, category)| view_one(sim, errors, alpha, id, category))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use skiff::{BodyState, PHYS_DT_MS, ShipState, SyncMsg};

    fn at_frame(start: Instant, frame: u32) -> Instant {
        start + Duration::from_secs_f64(frame as f64 * PHYS_DT_MS / 1000.0)
    }

    fn ship_sync(frame_id: u32, x: f32) -> SyncMsg {
        SyncMsg {
            frame_id,
            ship: ShipState {
                body: BodyState {
                    body_id: 1,
                    position: [x, 0.0],
                    angle: 0.0,
                    velocity: [0.0, 0.0],
                    angular_velocity: 0.0,
                },
                hp: 100,
            },
            hostiles: Vec::new(),
            rocks: Vec::new(),
            debug_boxes: Vec::new(),
        }
    }

    #[test]
    fn rendered_pose_converges_to_authoritative() {
        let start = Instant::now();
        let mut game = ClientGame::new(start);
        game.set_client_id(0);

        let frame = game.frame_id();
        game.on_sync(ship_sync(frame, 5.0));
        game.tick(at_frame(start, frame));

        let ship = game.simulation().current_state().ship.id;
        let initial_offset = game.error_offset(ship).position.x;
        assert!(initial_offset.abs() > 1.0);

        let now = at_frame(start, frame + 1);
        let mut last_gap = f32::MAX;
        for _ in 0..40 {
            let views = render_tick(&mut game, now);
            let view = views.iter().find(|v| v.id == ship).unwrap();
            let gap = (view.position.x - 5.0).abs();
            assert!(gap <= last_gap + 1e-4);
            last_gap = gap;
        }
        assert!(last_gap < 1e-2);
    }

    #[test]
    fn render_does_not_mutate_simulation() {
        let start = Instant::now();
        let mut game = ClientGame::new(start);
        game.tick(at_frame(start, 1));

        let before = {
            let state = game.simulation().current_state();
            state
                .physics
                .readout(state.ship.body)
                .unwrap()
                .position
        };

        render_tick(&mut game, at_frame(start, 1));

        let after = {
            let state = game.simulation().current_state();
            state
                .physics
                .readout(state.ship.body)
                .unwrap()
                .position
        };
        assert_eq!(before, after);
    }
}
