use glam::Vec2;

use crate::ai::{self, AgentView, Obstacle, TargetView};
use crate::constants::PHYS_DT;
use crate::control::{self, GunAim};
use crate::history::PendingAction;
use crate::net::ActionKind;
use crate::objects::{EntityId, FlightFlags, PowerAllocation};
use crate::state::GameState;

const LAZER_DAMAGE_PER_POWER: u8 = 2;

/// Per-step readout for HUD and server logging: where the gun pointed and
/// what, if anything, the lazer hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepTelemetry {
    pub gun_aim: Option<GunAim>,
    pub lazer: Option<LazerReport>,
}

#[derive(Debug, Clone, Copy)]
pub struct LazerReport {
    pub target: Option<EntityId>,
    pub impact: Vec2,
}

/// Merges one buffered action into the working state. Malformed actions are
/// excluded from application rather than surfaced; a debug spawn whose body
/// already exists is a success, not an error, so replays stay idempotent.
pub fn apply_action(working: &mut GameState, action: &PendingAction, frame_id: u32) {
    match action.kind {
        ActionKind::Flight { flags } => {
            working.ship.controls.flight = FlightFlags::from_bits_truncate(flags);
        }
        ActionKind::Gun { aim, firing } => {
            working.ship.controls.aim = Vec2::from(aim);
            working.ship.controls.firing = firing;
        }
        ActionKind::Power {
            engines,
            guns,
            radar,
            shields,
        } => {
            let requested = PowerAllocation::new(engines, guns, radar, shields);
            if requested.is_valid() {
                working.ship.controls.power = requested;
            } else {
                log::debug!("discarding over-budget power request {:?}", requested);
            }
        }
        ActionKind::Waypoint { target } => {
            working.ship.controls.waypoint = target.map(Vec2::from);
        }
        ActionKind::DebugSpawn { position, velocity } => {
            let Some(spawn_id) = action.spawn_id else {
                log::debug!("debug spawn without an assigned id, ignoring");
                return;
            };
            if working.debug_boxes.contains_key(&spawn_id) {
                return;
            }
            working.spawn_debug_box(
                spawn_id,
                action.client_id.unwrap_or(0),
                frame_id,
                Vec2::from(position),
                Vec2::from(velocity),
            );
        }
    }
}

/// Runs the hostile goal state machines against the live frame. Replayed
/// frames skip this: the chosen motion command travels inside the forked
/// state, so history re-derives identically.
pub fn update_goals(state: &mut GameState) {
    let GameState {
        physics,
        ship,
        hostiles,
        rng,
        ..
    } = state;

    let Some(ship_readout) = physics.readout(ship.body) else {
        return;
    };
    let them = TargetView {
        position: ship_readout.position,
        velocity: ship_readout.velocity,
        hp: ship.hp,
        radar_power: ship.controls.power.radar,
    };

    for hostile in hostiles.values_mut() {
        let Some(us_readout) = physics.readout(hostile.body) else {
            continue;
        };
        let us = AgentView {
            position: us_readout.position,
            velocity: us_readout.velocity,
            hp: hostile.hp,
        };

        let range = us_readout.velocity.length() * 3.0 + 10.0;
        let obstacles: Vec<Obstacle> = physics
            .query_aabb(us_readout.position, Vec2::splat(range), Some(hostile.body))
            .into_iter()
            .filter(|hit| hit.body != ship.body)
            .map(|hit| Obstacle {
                position: hit.position,
                extent_sqr: hit.extent_sqr,
            })
            .collect();

        hostile
            .brain
            .compute(&us, &them, &obstacles, PHYS_DT, rng);
    }
}

/// Advances one frame: actions merge in receipt order, the pre-integration
/// snapshot is forked for the history ring, then behaviors and controls push
/// forces into the collaborator and it solves one fixed step. Returns the
/// snapshot; the working state carries forward as the next frame's input.
pub fn step_frame(
    working: &mut GameState,
    actions: &[PendingAction],
    frame_id: u32,
) -> GameState {
    for action in actions {
        apply_action(working, action, frame_id);
    }

    let snapshot = working.fork();

    {
        let GameState {
            physics,
            ship,
            hostiles,
            ..
        } = working;

        for hostile in hostiles.values() {
            if let Some(motion) = hostile.brain.motion() {
                ai::do_motion(physics, hostile.body, motion);
            }
        }
        control::fly_ship(physics, ship);
    }

    working.physics.solve(PHYS_DT);
    snapshot
}

/// Post-integration weapons pass: aim telemetry every frame, lazer raycast
/// while firing with powered guns. Damage is authoritative-only; predictive
/// clients pick up hull state from the next sync instead.
pub fn post_step(state: &mut GameState, authoritative: bool) -> StepTelemetry {
    let Some(aim) = control::gun_aim(&state.physics, &state.ship) else {
        return StepTelemetry::default();
    };

    let mut telemetry = StepTelemetry {
        gun_aim: Some(aim),
        lazer: None,
    };

    if !state.ship.controls.firing || state.ship.controls.power.guns == 0 {
        return telemetry;
    }

    match control::cast_lazer(&state.physics, &state.ship, &aim) {
        Some(hit) => {
            let target = state.entity_of(hit.body);
            telemetry.lazer = Some(LazerReport {
                target,
                impact: hit.point,
            });

            if authoritative {
                if let Some(id) = target {
                    let damage = state.ship.controls.power.guns * LAZER_DAMAGE_PER_POWER;
                    let destroyed = match state.hostiles.get_mut(&id) {
                        Some(hostile) => {
                            hostile.hp = hostile.hp.saturating_sub(damage);
                            hostile.hp == 0
                        }
                        None => false,
                    };
                    if destroyed {
                        state.despawn_hostile(id);
                        log::info!("hostile {:?} destroyed by lazer fire", id);
                    }
                }
            }
        }
        None => {
            let range = control::lazer_range(&state.ship.controls.power);
            telemetry.lazer = Some(LazerReport {
                target: None,
                impact: aim.origin + aim.direction * range,
            });
        }
    }

    telemetry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_action(frame_id: u32, spawn_id: Option<EntityId>) -> PendingAction {
        PendingAction {
            kind: ActionKind::DebugSpawn {
                position: [3.0, 3.0],
                velocity: [0.0, 0.0],
            },
            frame_id,
            client_id: Some(1),
            spawn_id,
            acked: false,
        }
    }

    #[test]
    fn duplicate_spawn_is_idempotent() {
        let mut state = GameState::new(9);
        let spawn_id = state.allocate_id();
        let action = debug_action(0, Some(spawn_id));

        apply_action(&mut state, &action, 0);
        let bodies_after_first = state.physics.body_count();
        apply_action(&mut state, &action, 0);

        assert_eq!(state.physics.body_count(), bodies_after_first);
        assert_eq!(state.debug_boxes.len(), 1);
    }

    #[test]
    fn replaying_against_forks_matches() {
        let mut state = GameState::new(9);
        let spawn_id = state.allocate_id();
        let action = debug_action(0, Some(spawn_id));
        apply_action(&mut state, &action, 0);

        let mut left = state.fork();
        let mut right = state.fork();
        apply_action(&mut left, &action, 0);
        apply_action(&mut right, &action, 0);

        assert_eq!(left.debug_boxes.len(), 1);
        assert_eq!(right.debug_boxes.len(), 1);
        assert_eq!(left.physics.body_count(), right.physics.body_count());
    }

    #[test]
    fn spawn_without_id_is_ignored() {
        let mut state = GameState::new(9);
        apply_action(&mut state, &debug_action(0, None), 0);
        assert!(state.debug_boxes.is_empty());
    }

    #[test]
    fn over_budget_power_request_is_dropped() {
        let mut state = GameState::new(9);
        let before = state.ship.controls.power;

        let action = PendingAction {
            kind: ActionKind::Power {
                engines: 4,
                guns: 4,
                radar: 4,
                shields: 4,
            },
            frame_id: 0,
            client_id: None,
            spawn_id: None,
            acked: false,
        };
        apply_action(&mut state, &action, 0);

        assert_eq!(state.ship.controls.power, before);
    }

    #[test]
    fn snapshot_precedes_integration() {
        let mut working = GameState::new(9);
        working.ship.controls.flight = FlightFlags::FORWARD;

        let before = working.physics.readout(working.ship.body).unwrap();
        let snapshot = step_frame(&mut working, &[], 0);

        let kept = snapshot.physics.readout(snapshot.ship.body).unwrap();
        let stepped = working.physics.readout(working.ship.body).unwrap();
        assert_eq!(kept.position, before.position);
        assert!(stepped.velocity.y > kept.velocity.y);
    }
}
