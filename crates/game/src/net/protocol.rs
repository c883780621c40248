use rkyv::{Archive, Deserialize, Serialize, rancor};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x534B4946;
pub const DEFAULT_PORT: u16 = 27101;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

/// One player/system input, tagged with the frame it applies to. Direction
/// booleans travel as a packed bit group.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ActionKind {
    Flight { flags: u8 },
    Gun { aim: [f32; 2], firing: bool },
    Power { engines: u8, guns: u8, radar: u8, shields: u8 },
    Waypoint { target: Option<[f32; 2]> },
    DebugSpawn { position: [f32; 2], velocity: [f32; 2] },
}

#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ActionMsg {
    pub frame_id: u32,
    pub kind: ActionKind,
}

/// Kinematic state of one body as the server last solved it.
#[derive(Debug, Clone, Copy, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct BodyState {
    pub body_id: u32,
    pub position: [f32; 2],
    pub angle: f32,
    pub velocity: [f32; 2],
    pub angular_velocity: f32,
}

#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ShipState {
    pub body: BodyState,
    pub hp: u8,
}

#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct HostileState {
    pub body: BodyState,
    pub hp: u8,
}

#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct RockState {
    pub body: BodyState,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct DebugBoxState {
    pub body: BodyState,
    pub owner: u8,
    pub frame_id: u32,
}

/// Authoritative world snapshot, broadcast every tick.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SyncMsg {
    pub frame_id: u32,
    pub ship: ShipState,
    pub hostiles: Vec<HostileState>,
    pub rocks: Vec<RockState>,
    pub debug_boxes: Vec<DebugBoxState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct RosterEntry {
    pub client_id: u8,
    pub role: u8,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Message {
    Join,
    Welcome {
        client_id: u8,
        frame_id: u32,
        roster: Vec<RosterEntry>,
        names: Vec<String>,
    },
    JoinDenied {
        reason: String,
    },
    ClientJoined {
        client_id: u8,
        name: String,
    },
    ClientLeft {
        client_id: u8,
    },
    SetName {
        name: String,
    },
    NameChanged {
        client_id: u8,
        name: String,
    },
    SetRole {
        role: u8,
    },
    RoleAssigned {
        client_id: u8,
        role: u8,
    },
    Action(ActionMsg),
    ActionAck {
        frame_id: u32,
        body_id: u32,
    },
    Sync(SyncMsg),
    Timing {
        game_time_ms: f64,
    },
    Ping {
        nonce: u32,
    },
    Pong {
        nonce: u32,
    },
    Disconnect,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub message: Message,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Packet {
    pub fn new(header: PacketHeader, message: Message) -> Self {
        Self { header, message }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}
