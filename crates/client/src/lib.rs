pub mod game;
pub mod net;
pub mod reconcile;
pub mod render;

pub use game::ClientGame;
pub use net::{ClientSession, CrewMate};
pub use reconcile::{ERROR_DECAY, ErrorMap, ErrorOffset, SYNC_EPSILON};
pub use render::{BodyCategory, BodyView, render_tick};
