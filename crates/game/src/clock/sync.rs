use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Round trips issued back-to-back per burst.
pub const BURST_COUNT: u32 = 20;
/// Rolling RTT sample window shared across bursts.
pub const KEEP_COUNT: usize = 100;
/// Idle time between bursts.
pub const BURST_INTERVAL: Duration = Duration::from_secs(30);
/// A ping unanswered for this long means the connection is gone.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Mean of the samples after a single-pass outlier trim: compute the mean,
/// then average only the samples strictly within two standard deviations of
/// it. Rejects tail latency spikes without a full robust estimator.
pub fn filtered_mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance =
        samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / samples.len() as f64;
    let std_dev = variance.sqrt();

    let significant: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|v| (v - mean).abs() < std_dev * 2.0)
        .collect();

    if significant.is_empty() {
        return mean;
    }
    significant.iter().sum::<f64>() / significant.len() as f64
}

/// What the synchronizer wants sent over the connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncCommand {
    Ping { nonce: u32 },
    Timing { game_time_ms: f64 },
}

#[derive(Debug)]
enum Phase {
    Bursting {
        remaining: u32,
        in_flight: Option<(u32, Instant)>,
    },
    Sleeping {
        resume_at: Instant,
    },
    Closed,
}

/// Per-connection clock synchronizer, driven by the server's poll loop.
/// Cycles burst -> timing -> sleep until the connection dies; a ping that
/// goes unanswered closes the loop rather than polluting the sample set.
#[derive(Debug)]
pub struct ClockSync {
    phase: Phase,
    samples: VecDeque<f64>,
    next_nonce: u32,
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSync {
    pub fn new() -> Self {
        Self {
            phase: Phase::Bursting {
                remaining: BURST_COUNT,
                in_flight: None,
            },
            samples: VecDeque::new(),
            next_nonce: 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }

    /// Advances the state machine. `game_elapsed_ms` is the sender's game
    /// time, used when a completed burst produces a timing message.
    pub fn poll(&mut self, now: Instant, game_elapsed_ms: f64) -> Option<SyncCommand> {
        match &mut self.phase {
            Phase::Closed => None,
            Phase::Sleeping { resume_at } => {
                if now >= *resume_at {
                    self.phase = Phase::Bursting {
                        remaining: BURST_COUNT,
                        in_flight: None,
                    };
                }
                None
            }
            Phase::Bursting {
                remaining,
                in_flight,
            } => {
                if let Some((_, sent_at)) = in_flight {
                    if now.saturating_duration_since(*sent_at) > PING_TIMEOUT {
                        log::warn!("clock probe went unanswered, ending synchronization");
                        self.phase = Phase::Closed;
                    }
                    return None;
                }

                if *remaining == 0 {
                    self.samples.truncate(KEEP_COUNT);
                    let samples: Vec<f64> = self.samples.iter().copied().collect();
                    let rtt = filtered_mean(&samples);
                    self.phase = Phase::Sleeping {
                        resume_at: now + BURST_INTERVAL,
                    };
                    return Some(SyncCommand::Timing {
                        game_time_ms: game_elapsed_ms + rtt / 2.0,
                    });
                }

                let nonce = self.next_nonce;
                self.next_nonce = self.next_nonce.wrapping_add(1);
                *in_flight = Some((nonce, now));
                *remaining -= 1;
                Some(SyncCommand::Ping { nonce })
            }
        }
    }

    /// Feeds a pong back into the active burst. Stale or unexpected nonces
    /// are ignored.
    pub fn on_pong(&mut self, nonce: u32, now: Instant) {
        if let Phase::Bursting { in_flight, .. } = &mut self.phase {
            if let Some((expected, sent_at)) = *in_flight {
                if expected == nonce {
                    let rtt_ms = now.saturating_duration_since(sent_at).as_secs_f64() * 1000.0;
                    self.samples.push_front(rtt_ms);
                    *in_flight = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_excludes_single_outlier() {
        let filtered = filtered_mean(&[10.0, 10.0, 10.0, 10.0, 200.0]);
        assert!((filtered - 10.0).abs() < 1e-9);
    }

    #[test]
    fn trim_of_uniform_samples_is_their_mean() {
        assert_eq!(filtered_mean(&[25.0, 25.0, 25.0]), 25.0);
    }

    #[test]
    fn burst_produces_timing_then_sleeps() {
        let mut sync = ClockSync::new();
        let mut now = Instant::now();

        for _ in 0..BURST_COUNT {
            let command = sync.poll(now, 0.0);
            let Some(SyncCommand::Ping { nonce }) = command else {
                panic!("expected ping, got {:?}", command);
            };
            now += Duration::from_millis(10);
            sync.on_pong(nonce, now);
        }

        let command = sync.poll(now, 1000.0);
        match command {
            Some(SyncCommand::Timing { game_time_ms }) => {
                // ten-millisecond round trips: transit is half that
                assert!((game_time_ms - 1005.0).abs() < 0.5);
            }
            other => panic!("expected timing, got {:?}", other),
        }

        // sleeping: nothing to send until the interval elapses
        assert_eq!(sync.poll(now + Duration::from_secs(1), 1000.0), None);
        assert_eq!(sync.poll(now + BURST_INTERVAL, 2000.0), None);
        assert!(matches!(
            sync.poll(now + BURST_INTERVAL, 2000.0),
            Some(SyncCommand::Ping { .. })
        ));
    }

    #[test]
    fn unanswered_ping_closes_the_loop() {
        let mut sync = ClockSync::new();
        let now = Instant::now();

        assert!(matches!(sync.poll(now, 0.0), Some(SyncCommand::Ping { .. })));
        assert_eq!(sync.poll(now + PING_TIMEOUT + Duration::from_secs(1), 0.0), None);
        assert!(sync.is_closed());
        assert_eq!(sync.poll(now + Duration::from_secs(60), 0.0), None);
    }

    #[test]
    fn stale_pong_is_ignored() {
        let mut sync = ClockSync::new();
        let now = Instant::now();

        let Some(SyncCommand::Ping { nonce }) = sync.poll(now, 0.0) else {
            panic!("expected ping");
        };
        sync.on_pong(nonce.wrapping_add(99), now);
        assert!(sync.samples.is_empty());

        sync.on_pong(nonce, now + Duration::from_millis(5));
        assert_eq!(sync.samples.len(), 1);
    }
}
