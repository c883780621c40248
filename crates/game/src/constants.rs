/// Target number of physics steps per second, shared by server and clients.
pub const PHYS_FPS: u32 = 40;

/// Duration of one physics step in seconds.
pub const PHYS_DT: f32 = 1.0 / PHYS_FPS as f32;

/// Duration of one physics step in milliseconds.
pub const PHYS_DT_MS: f64 = 1000.0 / PHYS_FPS as f64;

/// Number of retained historical frames available for replay. Actions that
/// target a frame older than this window are unrecoverable and get dropped.
pub const FRAME_WINDOW: usize = 5;
