mod connection;
mod endpoint;
mod protocol;

pub use connection::{ConnectionManager, RemoteClient, Role};
pub use endpoint::{NetworkEndpoint, NetworkStats};
pub use protocol::{
    ActionKind, ActionMsg, BodyState, DebugBoxState, HostileState, Message, Packet, PacketError,
    PacketHeader, RockState, RosterEntry, ShipState, SyncMsg, DEFAULT_PORT, MAX_PACKET_SIZE,
    PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
