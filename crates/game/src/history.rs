use std::collections::VecDeque;

use crate::constants::FRAME_WINDOW;
use crate::net::ActionKind;
use crate::objects::EntityId;
use crate::state::GameState;

/// An accepted action waiting in (or expired from) the window, bucketed by
/// its target frame. Debug spawns get their entity id assigned on acceptance
/// so that replaying them is idempotent.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub frame_id: u32,
    pub client_id: Option<u8>,
    pub spawn_id: Option<EntityId>,
    pub acked: bool,
}

/// Fixed-depth ring of recent simulation states plus the per-frame action
/// buckets that produced them. Slot 0 is the newest state; slot i holds the
/// pre-integration snapshot for frame `current_frame - i`. Slots are only
/// ever rewritten by replay.
pub struct HistoryRing {
    frames: VecDeque<GameState>,
    actions: VecDeque<Vec<PendingAction>>,
    frame_id: u32,
    oldest_unprocessed: u32,
}

impl HistoryRing {
    pub fn new(initial: GameState) -> Self {
        let mut frames = VecDeque::with_capacity(FRAME_WINDOW);
        for _ in 1..FRAME_WINDOW {
            frames.push_back(initial.fork());
        }
        frames.push_front(initial);

        Self {
            frames,
            actions: (0..FRAME_WINDOW).map(|_| Vec::new()).collect(),
            frame_id: 0,
            oldest_unprocessed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame whose transition runs next; also the newest frame actions may
    /// target.
    pub fn current_frame(&self) -> u32 {
        self.frame_id
    }

    pub fn oldest_unprocessed(&self) -> u32 {
        self.oldest_unprocessed
    }

    /// Resolves a frame id to a ring offset; defined only inside the window.
    pub fn offset_of(&self, frame_id: u32) -> Option<usize> {
        if frame_id > self.frame_id {
            return None;
        }
        let offset = (self.frame_id - frame_id) as usize;
        (offset < self.frames.len()).then_some(offset)
    }

    pub fn state_at_offset(&self, offset: usize) -> &GameState {
        &self.frames[offset]
    }

    pub fn state_at_offset_mut(&mut self, offset: usize) -> &mut GameState {
        &mut self.frames[offset]
    }

    pub fn replace_at_offset(&mut self, offset: usize, state: GameState) {
        self.frames[offset] = state;
    }

    pub fn actions_at_offset(&self, offset: usize) -> &[PendingAction] {
        &self.actions[offset]
    }

    pub fn actions_at_offset_mut(&mut self, offset: usize) -> &mut Vec<PendingAction> {
        &mut self.actions[offset]
    }

    /// Buckets an action by target frame. Out-of-window actions (too old or
    /// targeting the future) are refused; the return flag is the only signal
    /// the caller gets. Accepting an action for an already-stepped frame
    /// pulls the oldest-unprocessed marker back so the replay coordinator
    /// re-derives the affected suffix.
    pub fn add_action(&mut self, action: PendingAction) -> bool {
        let Some(offset) = self.offset_of(action.frame_id) else {
            return false;
        };

        self.oldest_unprocessed = self.oldest_unprocessed.min(action.frame_id);
        self.actions[offset].push(action);
        true
    }

    /// Publishes the newly-stepped state as slot 0, dropping the oldest slot
    /// and opening a fresh action bucket. Returns the expired bucket so the
    /// caller can tear down side effects of actions that were never
    /// acknowledged.
    pub fn push(&mut self, state: GameState) -> Vec<PendingAction> {
        self.frames.push_front(state);
        self.frames.pop_back();

        self.actions.push_front(Vec::new());
        let expired = self.actions.pop_back().unwrap_or_default();

        self.frame_id = self.frame_id.wrapping_add(1);
        self.oldest_unprocessed = self.frame_id;
        expired
    }

    /// Widens the next replay to start at `frame_id`, if it is still
    /// retained. Used when an authoritative sync refers back into history.
    pub fn pull_marker_back(&mut self, frame_id: u32) -> bool {
        if self.offset_of(frame_id).is_some() {
            self.oldest_unprocessed = self.oldest_unprocessed.min(frame_id);
            true
        } else {
            false
        }
    }

    /// Jumps the frame counter without stepping, leaving retained states in
    /// place. Used by clients that fell behind the shared clock.
    pub fn skip_to(&mut self, frame_id: u32) {
        self.frame_id = frame_id;
        self.oldest_unprocessed = frame_id;
    }

    /// Jumps the frame counter forward and invalidates the whole window,
    /// refilling every slot with a fork of the newest state. Pending action
    /// buckets are cleared; their frames no longer exist locally.
    pub fn reset_to(&mut self, frame_id: u32) {
        for offset in 1..self.frames.len() {
            self.frames[offset] = self.frames[0].fork();
        }
        for bucket in &mut self.actions {
            bucket.clear();
        }
        self.frame_id = frame_id;
        self.oldest_unprocessed = frame_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ActionKind;

    fn flight(frame_id: u32) -> PendingAction {
        PendingAction {
            kind: ActionKind::Flight { flags: 1 },
            frame_id,
            client_id: None,
            spawn_id: None,
            acked: false,
        }
    }

    fn ring_at_frame(frame: u32) -> HistoryRing {
        let mut ring = HistoryRing::new(GameState::new(1));
        for _ in 0..frame {
            let next = ring.state_at_offset(0).fork();
            ring.push(next);
        }
        ring
    }

    #[test]
    fn ring_keeps_exactly_window_slots() {
        let ring = ring_at_frame(20);
        assert_eq!(ring.len(), FRAME_WINDOW);
        assert_eq!(ring.current_frame(), 20);
        assert_eq!(ring.offset_of(20), Some(0));
        assert_eq!(ring.offset_of(16), Some(FRAME_WINDOW - 1));
        assert_eq!(ring.offset_of(15), None);
    }

    #[test]
    fn expired_action_is_rejected() {
        let mut ring = ring_at_frame(10);
        // frame 4 is one older than the oldest retained slot when N = 5
        assert!(!ring.add_action(flight(10 - FRAME_WINDOW as u32 - 1)));
        assert!(!ring.add_action(flight(11)));
        assert!(ring.add_action(flight(10)));
    }

    #[test]
    fn late_action_pulls_marker_back() {
        let mut ring = ring_at_frame(10);
        assert_eq!(ring.oldest_unprocessed(), 10);

        assert!(ring.add_action(flight(7)));
        assert_eq!(ring.oldest_unprocessed(), 7);

        // a newer action must not push the marker forward again
        assert!(ring.add_action(flight(9)));
        assert_eq!(ring.oldest_unprocessed(), 7);
    }

    #[test]
    fn push_returns_expired_bucket_and_resets_marker() {
        let mut ring = ring_at_frame(10);
        let oldest_retained = 10 - (FRAME_WINDOW as u32 - 1);
        assert!(ring.add_action(flight(oldest_retained)));

        let expired = ring.push(ring.state_at_offset(0).fork());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].frame_id, oldest_retained);
        assert_eq!(ring.oldest_unprocessed(), 11);
        assert_eq!(ring.current_frame(), 11);
    }

    #[test]
    fn reset_clears_buckets() {
        let mut ring = ring_at_frame(10);
        assert!(ring.add_action(flight(8)));

        ring.reset_to(50);
        assert_eq!(ring.current_frame(), 50);
        assert_eq!(ring.oldest_unprocessed(), 50);
        for offset in 0..FRAME_WINDOW {
            assert!(ring.actions_at_offset(offset).is_empty());
        }
    }
}
