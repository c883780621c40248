use crate::history::{HistoryRing, PendingAction};
use crate::net::{ActionKind, ActionMsg};
use crate::objects::EntityId;
use crate::state::GameState;
use crate::step::{self, StepTelemetry};

/// Result of `Simulation::add_action`. Debug spawns get their entity id
/// assigned at acceptance so the sender can be acked with a concrete body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Accepted { spawn_id: Option<EntityId> },
    Expired,
}

impl ActionOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, ActionOutcome::Accepted { .. })
    }
}

#[derive(Debug)]
pub struct AdvanceOutcome {
    /// Frame whose transition just completed.
    pub frame_id: u32,
    /// Action bucket that aged out of the window on this push.
    pub expired: Vec<PendingAction>,
    /// Weapons telemetry from the final (live) frame.
    pub telemetry: StepTelemetry,
}

/// One rollback-capable simulation instance: the history ring, the action
/// buckets, and the replay coordinator that re-derives invalidated frames.
/// The server owns one per game; every predictive client owns its own.
pub struct Simulation {
    ring: HistoryRing,
    authoritative: bool,
    next_entity_id: u32,
}

impl Simulation {
    pub fn new(initial: GameState, authoritative: bool) -> Self {
        let next_entity_id = initial.next_id();
        Self {
            ring: HistoryRing::new(initial),
            authoritative,
            next_entity_id,
        }
    }

    pub fn frame_id(&self) -> u32 {
        self.ring.current_frame()
    }

    pub fn oldest_unprocessed(&self) -> u32 {
        self.ring.oldest_unprocessed()
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Newest published state.
    pub fn current_state(&self) -> &GameState {
        self.ring.state_at_offset(0)
    }

    pub fn current_state_mut(&mut self) -> &mut GameState {
        self.ring.state_at_offset_mut(0)
    }

    /// State as of the previous frame boundary; render interpolation reads
    /// poses from here.
    pub fn previous_state(&self) -> &GameState {
        self.ring.state_at_offset(1.min(self.ring.len() - 1))
    }

    pub fn window_contains(&self, frame_id: u32) -> bool {
        self.ring.offset_of(frame_id).is_some()
    }

    /// Validates and buckets an incoming action. Out-of-window actions are
    /// dropped; the caller can audit the policy through the returned flag.
    pub fn add_action(&mut self, action: ActionMsg, client_id: Option<u8>) -> ActionOutcome {
        if self.ring.offset_of(action.frame_id).is_none() {
            log::debug!(
                "dropping action for frame {} outside window ending at {}",
                action.frame_id,
                self.ring.current_frame()
            );
            return ActionOutcome::Expired;
        }

        let spawn_id = match action.kind {
            ActionKind::DebugSpawn { .. } => {
                let id = EntityId(self.next_entity_id);
                self.next_entity_id += 1;
                Some(id)
            }
            _ => None,
        };

        let accepted = self.ring.add_action(PendingAction {
            kind: action.kind,
            frame_id: action.frame_id,
            client_id,
            spawn_id,
            acked: false,
        });
        debug_assert!(accepted);

        ActionOutcome::Accepted { spawn_id }
    }

    /// Replays every frame from the oldest unprocessed marker through the
    /// current frame, overwriting provisional ring slots, then publishes the
    /// result and resets the marker. `after_frame` runs on the working state
    /// right after each frame integrates; clients use it to merge
    /// authoritative syncs mid-replay.
    pub fn advance<F>(&mut self, mut after_frame: F) -> AdvanceOutcome
    where
        F: FnMut(u32, &mut GameState),
    {
        let target = self.ring.current_frame();
        let mut frame = self.ring.oldest_unprocessed();
        let start_offset = (target - frame) as usize;
        let mut working = self.ring.state_at_offset(start_offset).fork();
        let mut telemetry = StepTelemetry::default();

        while frame <= target {
            if frame == target {
                step::update_goals(&mut working);
            }

            let offset = (target - frame) as usize;
            let bucket = self.ring.actions_at_offset(offset).to_vec();
            let snapshot = step::step_frame(&mut working, &bucket, frame);
            self.ring.replace_at_offset(offset, snapshot);

            telemetry = step::post_step(&mut working, self.authoritative);
            after_frame(frame, &mut working);
            frame += 1;
        }

        let expired = self.ring.push(working);
        AdvanceOutcome {
            frame_id: target,
            expired,
            telemetry,
        }
    }

    /// Marks the earliest unacked debug action targeting `frame_id` as
    /// acknowledged, returning its locally assigned entity id.
    pub fn ack_debug_action(&mut self, frame_id: u32) -> Option<EntityId> {
        let offset = self.ring.offset_of(frame_id)?;
        for action in self.ring.actions_at_offset_mut(offset) {
            if matches!(action.kind, ActionKind::DebugSpawn { .. }) && !action.acked {
                action.acked = true;
                return action.spawn_id;
            }
        }
        None
    }

    /// Removes a transient body from every retained frame. Used when an
    /// unacknowledged debug action ages out: leaving copies in older slots
    /// would resurrect the body on the next deep replay.
    pub fn despawn_everywhere(&mut self, id: EntityId) {
        for offset in 0..self.ring.len() {
            self.ring.state_at_offset_mut(offset).despawn_debug_box(id);
        }
    }

    pub fn pull_marker_back(&mut self, frame_id: u32) -> bool {
        self.ring.pull_marker_back(frame_id)
    }

    pub fn skip_to(&mut self, frame_id: u32) {
        self.ring.skip_to(frame_id);
    }

    pub fn reset_to(&mut self, frame_id: u32) {
        self.ring.reset_to(frame_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ActionMsg;

    fn flight_msg(frame_id: u32, flags: u8) -> ActionMsg {
        ActionMsg {
            frame_id,
            kind: ActionKind::Flight { flags },
        }
    }

    #[test]
    fn advance_resets_marker_and_bumps_frame() {
        let mut sim = Simulation::new(GameState::new(5), true);
        assert_eq!(sim.frame_id(), 0);

        sim.advance(|_, _| {});
        assert_eq!(sim.frame_id(), 1);
        assert_eq!(sim.oldest_unprocessed(), 1);
    }

    #[test]
    fn late_action_triggers_suffix_replay() {
        let mut sim = Simulation::new(GameState::new(5), true);
        for _ in 0..4 {
            sim.advance(|_, _| {});
        }

        let outcome = sim.add_action(flight_msg(2, 1), None);
        assert!(outcome.accepted());
        assert_eq!(sim.oldest_unprocessed(), 2);

        let mut replayed = Vec::new();
        sim.advance(|frame, _| replayed.push(frame));
        assert_eq!(replayed, vec![2, 3, 4]);
        assert_eq!(sim.oldest_unprocessed(), 5);
    }

    #[test]
    fn rejected_action_reports_expired() {
        let mut sim = Simulation::new(GameState::new(5), true);
        for _ in 0..10 {
            sim.advance(|_, _| {});
        }

        // frame 4 is current - 6 with a window of 5
        assert_eq!(sim.add_action(flight_msg(4, 1), None), ActionOutcome::Expired);
    }

    #[test]
    fn debug_spawn_gets_distinct_ids() {
        let mut sim = Simulation::new(GameState::new(5), true);
        let spawn = ActionMsg {
            frame_id: 0,
            kind: ActionKind::DebugSpawn {
                position: [1.0, 1.0],
                velocity: [0.0, 0.0],
            },
        };

        let first = sim.add_action(spawn, Some(1));
        let second = sim.add_action(spawn, Some(1));
        match (first, second) {
            (
                ActionOutcome::Accepted { spawn_id: Some(a) },
                ActionOutcome::Accepted { spawn_id: Some(b) },
            ) => assert_ne!(a, b),
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[test]
    fn expired_unacked_spawn_can_be_torn_down_everywhere() {
        let mut sim = Simulation::new(GameState::new(5), false);
        let spawn = ActionMsg {
            frame_id: 0,
            kind: ActionKind::DebugSpawn {
                position: [1.0, 1.0],
                velocity: [0.0, 0.0],
            },
        };
        let ActionOutcome::Accepted { spawn_id: Some(id) } = sim.add_action(spawn, Some(1))
        else {
            panic!("spawn not accepted");
        };

        let mut expired = Vec::new();
        for _ in 0..crate::constants::FRAME_WINDOW + 1 {
            let outcome = sim.advance(|_, _| {});
            expired.extend(outcome.expired);
        }

        let aged_out: Vec<_> = expired
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::DebugSpawn { .. }) && !a.acked)
            .collect();
        assert_eq!(aged_out.len(), 1);
        assert_eq!(aged_out[0].spawn_id, Some(id));

        sim.despawn_everywhere(id);
        assert!(!sim.current_state().debug_boxes.contains_key(&id));
    }
}
