use rapier2d::prelude::RigidBodyHandle;

use crate::net::{BodyState, DebugBoxState, HostileState, RockState, ShipState, SyncMsg};
use crate::objects::EntityId;
use crate::state::GameState;

fn body_state(state: &GameState, id: EntityId, handle: RigidBodyHandle) -> BodyState {
    match state.physics.readout(handle) {
        Some(readout) => BodyState {
            body_id: id.0,
            position: readout.position.into(),
            angle: readout.angle,
            velocity: readout.velocity.into(),
            angular_velocity: readout.angular_velocity,
        },
        None => BodyState {
            body_id: id.0,
            ..Default::default()
        },
    }
}

/// Flattens the authoritative state into the per-category sync payload
/// broadcast after every tick.
pub fn build_sync(state: &GameState, frame_id: u32) -> SyncMsg {
    SyncMsg {
        frame_id,
        ship: ShipState {
            body: body_state(state, state.ship.id, state.ship.body),
            hp: state.ship.hp,
        },
        hostiles: state
            .hostiles
            .values()
            .map(|hostile| HostileState {
                body: body_state(state, hostile.id, hostile.body),
                hp: hostile.hp,
            })
            .collect(),
        rocks: state
            .rocks
            .values()
            .map(|rock| RockState {
                body: body_state(state, rock.id, rock.body),
                radius: rock.radius,
            })
            .collect(),
        debug_boxes: state
            .debug_boxes
            .values()
            .map(|debug_box| DebugBoxState {
                body: body_state(state, debug_box.id, debug_box.body),
                owner: debug_box.owner,
                frame_id: debug_box.frame_id,
            })
            .collect(),
    }
}
