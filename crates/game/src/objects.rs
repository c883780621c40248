use bitflags::bitflags;
use glam::Vec2;
use rapier2d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use crate::ai::Brain;

/// Stable identifier for a game entity. Body handles are an implementation
/// detail of one physics world; entity ids are what crosses the wire and
/// what both sides key their maps by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u32);

bitflags! {
    /// Packed directional flight inputs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlightFlags: u8 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

/// Power routed to each ship system. Channels are small integers; the sum is
/// capped so the engineer has to trade systems off against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerAllocation {
    pub engines: u8,
    pub guns: u8,
    pub radar: u8,
    pub shields: u8,
}

impl Default for PowerAllocation {
    fn default() -> Self {
        Self {
            engines: 2,
            guns: 2,
            radar: 2,
            shields: 2,
        }
    }
}

impl PowerAllocation {
    pub const MAX_CHANNEL: u8 = 4;
    pub const MAX_TOTAL: u8 = 8;

    pub fn new(engines: u8, guns: u8, radar: u8, shields: u8) -> Self {
        Self {
            engines,
            guns,
            radar,
            shields,
        }
    }

    pub fn total(&self) -> u8 {
        self.engines + self.guns + self.radar + self.shields
    }

    pub fn is_valid(&self) -> bool {
        self.engines <= Self::MAX_CHANNEL
            && self.guns <= Self::MAX_CHANNEL
            && self.radar <= Self::MAX_CHANNEL
            && self.shields <= Self::MAX_CHANNEL
            && self.total() <= Self::MAX_TOTAL
    }
}

/// The ship's latched control surface. Actions merge into this; the flight
/// model and gun systems read it every step until new actions change it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShipControls {
    pub flight: FlightFlags,
    pub aim: Vec2,
    pub firing: bool,
    pub power: PowerAllocation,
    pub waypoint: Option<Vec2>,
}

#[derive(Debug, Clone)]
pub struct Ship {
    pub id: EntityId,
    pub body: RigidBodyHandle,
    pub hp: u8,
    pub controls: ShipControls,
}

impl Ship {
    pub const MAX_HP: u8 = 100;

    pub fn new(id: EntityId, body: RigidBodyHandle) -> Self {
        Self {
            id,
            body,
            hp: Self::MAX_HP,
            controls: ShipControls::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hostile {
    pub id: EntityId,
    pub body: RigidBodyHandle,
    pub hp: u8,
    pub brain: Brain,
}

impl Hostile {
    pub const MAX_HP: u8 = 100;

    pub fn new(id: EntityId, body: RigidBodyHandle) -> Self {
        Self {
            id,
            body,
            hp: Self::MAX_HP,
            brain: Brain::default(),
        }
    }
}

/// Environmental debris; inert, but solid enough to matter to flight and
/// lazer fire.
#[derive(Debug, Clone)]
pub struct Rock {
    pub id: EntityId,
    pub body: RigidBodyHandle,
    pub radius: f32,
}

/// Transient body spawned by a debug action. Tracked with its origin so the
/// spawning client can recognize its own boxes in a sync, and so unacked
/// boxes can be torn down when their action expires.
#[derive(Debug, Clone)]
pub struct DebugBox {
    pub id: EntityId,
    pub body: RigidBodyHandle,
    pub owner: u8,
    pub frame_id: u32,
}
