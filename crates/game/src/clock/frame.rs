use std::time::{Duration, Instant};

use crate::constants::PHYS_DT_MS;

fn ms(amount: f64) -> Duration {
    Duration::from_secs_f64(amount.max(0.0) / 1000.0)
}

/// Maps wall time onto frame ids around a shared epoch ("frame zero").
/// Tick loops schedule against the absolute deadline of the next frame, so a
/// late tick does not skew every following one. The client re-anchors its
/// epoch whenever the server sends a timing message.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    epoch: Instant,
}

impl FrameClock {
    pub fn start(now: Instant) -> Self {
        Self { epoch: now }
    }

    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.epoch).as_secs_f64() * 1000.0
    }

    /// Frame the wall clock currently sits in.
    pub fn current_frame(&self, now: Instant) -> u32 {
        (self.elapsed_ms(now) / PHYS_DT_MS).round() as u32
    }

    /// Absolute instant at which `frame` is due.
    pub fn deadline_for(&self, frame: u32) -> Instant {
        self.epoch + ms(frame as f64 * PHYS_DT_MS)
    }

    /// Re-anchors the epoch from the server's game time (already offset by
    /// one-way transit). Returns the frame the local loop should resume at.
    pub fn reanchor(&mut self, now: Instant, game_time_ms: f64) -> u32 {
        self.epoch = now.checked_sub(ms(game_time_ms)).unwrap_or(now);
        (game_time_ms / PHYS_DT_MS).floor() as u32 + 1
    }

    /// Moves the epoch so that `frame` is current right now. Used when an
    /// authoritative sync arrives from a frame the local clock has not
    /// reached yet.
    pub fn jump_to_frame(&mut self, frame: u32, now: Instant) {
        self.epoch = now.checked_sub(ms(frame as f64 * PHYS_DT_MS)).unwrap_or(now);
    }

    /// Fraction of the current frame that has elapsed, for render-side
    /// interpolation between the previous and current poses.
    pub fn subframe_ratio(&self, current_frame: u32, now: Instant) -> f32 {
        let last_boundary = current_frame.saturating_sub(1) as f64 * PHYS_DT_MS;
        let into_frame = self.elapsed_ms(now) - last_boundary;
        (into_frame / PHYS_DT_MS).clamp(0.0, 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_advance_with_time() {
        let start = Instant::now();
        let clock = FrameClock::start(start);

        assert_eq!(clock.current_frame(start), 0);
        assert_eq!(clock.current_frame(start + ms(10.0 * PHYS_DT_MS)), 10);
    }

    #[test]
    fn deadlines_are_absolute() {
        let start = Instant::now();
        let clock = FrameClock::start(start);

        let d5 = clock.deadline_for(5);
        let d6 = clock.deadline_for(6);
        assert_eq!(d6 - d5, ms(PHYS_DT_MS));
        assert_eq!(d5 - start, ms(5.0 * PHYS_DT_MS));
    }

    #[test]
    fn reanchor_tracks_server_time() {
        let start = Instant::now();
        let mut clock = FrameClock::start(start);
        let now = start + ms(5000.0);

        let frame = clock.reanchor(now, 2500.0);
        assert_eq!(frame, (2500.0 / PHYS_DT_MS) as u32 + 1);
        assert!((clock.elapsed_ms(now) - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn jump_makes_frame_current() {
        let start = Instant::now();
        let mut clock = FrameClock::start(start);
        let now = start + ms(100.0);

        clock.jump_to_frame(400, now);
        assert_eq!(clock.current_frame(now), 400);
    }

    #[test]
    fn subframe_ratio_spans_the_frame() {
        let start = Instant::now();
        let clock = FrameClock::start(start);

        let mid = start + ms(PHYS_DT_MS * 0.5);
        let ratio = clock.subframe_ratio(1, mid);
        assert!((ratio - 0.5).abs() < 0.01);
    }
}
