use std::collections::BTreeMap;

use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rapier2d::prelude::RigidBodyHandle;

use crate::objects::{DebugBox, EntityId, Hostile, Rock, Ship};
use crate::physics::PhysicsWorld;

/// One consistent snapshot of the world at a frame boundary: the physics
/// collaborator plus every game entity wrapping a body inside it. States are
/// immutable once published into the history ring; `fork` is the only way to
/// derive a new one. Entity maps are ordered so that iteration (and
/// therefore stepping) is deterministic.
pub struct GameState {
    pub physics: PhysicsWorld,
    pub ship: Ship,
    pub hostiles: BTreeMap<EntityId, Hostile>,
    pub rocks: BTreeMap<EntityId, Rock>,
    pub debug_boxes: BTreeMap<EntityId, DebugBox>,
    pub(crate) rng: SmallRng,
    next_id: u32,
}

impl GameState {
    pub fn new(seed: u64) -> Self {
        let mut physics = PhysicsWorld::new();
        let ship_body = physics.add_ship(Vec2::ZERO, 0.0);

        Self {
            physics,
            ship: Ship::new(EntityId(1), ship_body),
            hostiles: BTreeMap::new(),
            rocks: BTreeMap::new(),
            debug_boxes: BTreeMap::new(),
            rng: SmallRng::seed_from_u64(seed),
            next_id: 2,
        }
    }

    /// Deep, structure-free copy. The RNG forks too, so a replayed frame
    /// re-rolls exactly the values the original roll produced.
    pub fn fork(&self) -> Self {
        Self {
            physics: self.physics.fork(),
            ship: self.ship.clone(),
            hostiles: self.hostiles.clone(),
            rocks: self.rocks.clone(),
            debug_boxes: self.debug_boxes.clone(),
            rng: self.rng.clone(),
            next_id: self.next_id,
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Highest id handed out so far; a simulation session seeds its own
    /// allocator from this so buffered actions can carry pre-assigned ids.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn spawn_hostile(&mut self, position: Vec2, angle: f32) -> EntityId {
        let id = self.allocate_id();
        let body = self.physics.add_hostile(position, angle);
        self.hostiles.insert(id, Hostile::new(id, body));
        id
    }

    pub fn spawn_rock(&mut self, position: Vec2, radius: f32) -> EntityId {
        let id = self.allocate_id();
        let body = self.physics.add_rock(position, radius);
        self.rocks.insert(id, Rock { id, body, radius });
        id
    }

    /// Adds a debug box under a pre-assigned id. The caller (the action
    /// pipeline) guarantees the id is unique within this simulation.
    pub fn spawn_debug_box(
        &mut self,
        id: EntityId,
        owner: u8,
        frame_id: u32,
        position: Vec2,
        velocity: Vec2,
    ) {
        let body = self.physics.add_box(position, velocity);
        self.debug_boxes.insert(
            id,
            DebugBox {
                id,
                body,
                owner,
                frame_id,
            },
        );
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
    }

    pub fn despawn_hostile(&mut self, id: EntityId) -> bool {
        if let Some(hostile) = self.hostiles.remove(&id) {
            self.physics.remove_body(hostile.body);
            true
        } else {
            false
        }
    }

    pub fn despawn_debug_box(&mut self, id: EntityId) -> bool {
        if let Some(debug_box) = self.debug_boxes.remove(&id) {
            self.physics.remove_body(debug_box.body);
            true
        } else {
            false
        }
    }

    /// Resolves an entity id to its body handle across all categories.
    pub fn body_of(&self, id: EntityId) -> Option<RigidBodyHandle> {
        if self.ship.id == id {
            return Some(self.ship.body);
        }
        if let Some(hostile) = self.hostiles.get(&id) {
            return Some(hostile.body);
        }
        if let Some(rock) = self.rocks.get(&id) {
            return Some(rock.body);
        }
        self.debug_boxes.get(&id).map(|b| b.body)
    }

    /// Maps a body handle back to the entity that owns it.
    pub fn entity_of(&self, body: RigidBodyHandle) -> Option<EntityId> {
        if self.ship.body == body {
            return Some(self.ship.id);
        }
        if let Some(hostile) = self.hostiles.values().find(|h| h.body == body) {
            return Some(hostile.id);
        }
        if let Some(rock) = self.rocks.values().find(|r| r.body == body) {
            return Some(rock.id);
        }
        self.debug_boxes.values().find(|b| b.body == body).map(|b| b.id)
    }
}
