use std::collections::BTreeMap;

use glam::Vec2;

use skiff::math::clean_angle;
use skiff::{BodyState, EntityId, GameState};

/// Factor applied to every error offset per render tick. Corrections are
/// absorbed over a handful of frames instead of snapping on screen.
pub const ERROR_DECAY: f32 = 0.85;

/// Discrepancies smaller than this are left alone entirely.
pub const SYNC_EPSILON: f32 = 1e-4;

/// Decaying visual delta between predicted and authoritative state for one
/// entity. The physics body is always authority-correct immediately after
/// reconciliation; rendering subtracts this offset so the correction is
/// invisible until it has decayed away.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorOffset {
    pub position: Vec2,
    pub angle: f32,
}

impl ErrorOffset {
    pub fn decay(&mut self) {
        self.position *= ERROR_DECAY;
        self.angle *= ERROR_DECAY;
    }
}

/// Per-entity error offsets, client-only.
#[derive(Debug, Default)]
pub struct ErrorMap {
    offsets: BTreeMap<EntityId, ErrorOffset>,
}

impl ErrorMap {
    /// Registers a freshly instantiated entity with a zero offset.
    pub fn register(&mut self, id: EntityId) {
        self.offsets.entry(id).or_default();
    }

    pub fn get(&self, id: EntityId) -> ErrorOffset {
        self.offsets.get(&id).copied().unwrap_or_default()
    }

    pub fn offset_mut(&mut self, id: EntityId) -> &mut ErrorOffset {
        self.offsets.entry(id).or_default()
    }

    pub fn remove(&mut self, id: EntityId) {
        self.offsets.remove(&id);
    }
}

/// Merges one authoritative body state into the working simulation state.
/// Within epsilon nothing happens; otherwise the visible pose is preserved
/// by folding the correction into the error offset while the physics body
/// snaps to the authoritative values and wakes. Returns whether a
/// correction was applied.
pub fn absorb_body(
    working: &mut GameState,
    local_id: EntityId,
    authoritative: &BodyState,
    offset: &mut ErrorOffset,
) -> bool {
    let Some(handle) = working.body_of(local_id) else {
        return false;
    };
    let Some(readout) = working.physics.readout(handle) else {
        return false;
    };

    let auth_position = Vec2::from(authoritative.position);
    let auth_velocity = Vec2::from(authoritative.velocity);

    let within_epsilon = (auth_position.x - readout.position.x).abs() < SYNC_EPSILON
        && (auth_position.y - readout.position.y).abs() < SYNC_EPSILON
        && clean_angle(authoritative.angle - readout.angle).abs() < SYNC_EPSILON
        && (auth_velocity - readout.velocity).length() < SYNC_EPSILON
        && (authoritative.angular_velocity - readout.angular_velocity).abs() < SYNC_EPSILON;
    if within_epsilon {
        return false;
    }

    // what the player currently sees, with the old offset backed out
    let observed_position = readout.position - offset.position;
    let observed_angle = readout.angle - offset.angle;

    offset.position = auth_position - observed_position;
    offset.angle = clean_angle(authoritative.angle - observed_angle);

    working.physics.snap_body(
        handle,
        auth_position,
        authoritative.angle,
        auth_velocity,
        authoritative.angular_velocity,
    );
    true
}
