pub mod ai;
pub mod clock;
pub mod constants;
pub mod control;
pub mod history;
pub mod map;
pub mod math;
pub mod net;
pub mod objects;
pub mod physics;
pub mod session;
pub mod state;
pub mod step;
pub mod sync;

pub use clock::{ClockSync, FrameClock, SyncCommand};
pub use constants::{FRAME_WINDOW, PHYS_DT, PHYS_DT_MS, PHYS_FPS};
pub use control::GunAim;
pub use history::{HistoryRing, PendingAction};
pub use net::{
    ActionKind, ActionMsg, BodyState, ConnectionManager, DEFAULT_PORT, DebugBoxState,
    HostileState, Message, NetworkEndpoint, Packet, PacketError, PacketHeader, RemoteClient,
    RockState, Role, RosterEntry, ShipState, SyncMsg,
};
pub use objects::{
    DebugBox, EntityId, FlightFlags, Hostile, PowerAllocation, Rock, Ship, ShipControls,
};
pub use physics::PhysicsWorld;
pub use session::{ActionOutcome, AdvanceOutcome, Simulation};
pub use state::GameState;
pub use step::{LazerReport, StepTelemetry};
pub use sync::build_sync;
