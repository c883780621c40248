mod frame;
mod sync;

pub use frame::FrameClock;
pub use sync::{ClockSync, SyncCommand, filtered_mean};
