use std::collections::BTreeMap;
use std::time::Instant;

use glam::Vec2;

use skiff::{
    ActionKind, ActionMsg, AdvanceOutcome, EntityId, FrameClock, GameState, Simulation, SyncMsg,
};

use crate::reconcile::{ErrorMap, absorb_body};

/// Seed for the client's local prediction state. The opening world arrives
/// through syncs, so the seed only has to match the server's construction
/// order for the ship.
const CLIENT_SEED: u64 = 0;

/// Predictive client simulation: a non-authoritative rollback core driven
/// by the shared frame clock, reconciled against server syncs without
/// visible snapping. Owns the server-id to local-id translation and the
/// per-entity error offsets.
pub struct ClientGame {
    sim: Simulation,
    clock: FrameClock,
    client_id: Option<u8>,
    pending_sync: Option<SyncMsg>,
    last_applied_sync: Option<u32>,
    id_map: BTreeMap<u32, EntityId>,
    errors: ErrorMap,
}

impl ClientGame {
    pub fn new(now: Instant) -> Self {
        let mut game = Self {
            sim: Simulation::new(GameState::new(CLIENT_SEED), false),
            clock: FrameClock::start(now),
            client_id: None,
            pending_sync: None,
            last_applied_sync: None,
            id_map: BTreeMap::new(),
            errors: ErrorMap::default(),
        };
        game.errors.register(game.sim.current_state().ship.id);
        game
    }

    pub fn set_client_id(&mut self, client_id: u8) {
        self.client_id = Some(client_id);
    }

    pub fn client_id(&self) -> Option<u8> {
        self.client_id
    }

    pub fn frame_id(&self) -> u32 {
        self.sim.frame_id()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn error_offset(&self, id: EntityId) -> crate::reconcile::ErrorOffset {
        self.errors.get(id)
    }

    pub fn local_id(&self, server_id: u32) -> Option<EntityId> {
        self.id_map.get(&server_id).copied()
    }

    /// Re-anchors the local epoch from a server timing message. The frame
    /// counter jumps to the server's idea of now; retained history keeps its
    /// states and will be corrected by subsequent syncs.
    pub fn on_timing(&mut self, now: Instant, game_time_ms: f64) {
        let frame = self.clock.reanchor(now, game_time_ms);
        log::debug!("re-anchored epoch, resuming at frame {frame}");
        self.sim.skip_to(frame);
    }

    /// Stores an authoritative sync for the next tick. Only the newest
    /// pending sync is kept, and syncs at or before the last applied frame
    /// are ignored outright.
    pub fn on_sync(&mut self, sync: SyncMsg) {
        if let Some(applied) = self.last_applied_sync {
            if sync.frame_id <= applied {
                return;
            }
        }
        if let Some(pending) = &self.pending_sync {
            if sync.frame_id <= pending.frame_id {
                return;
            }
        }
        self.pending_sync = Some(sync);
    }

    /// Maps a server acknowledgment of one of our debug actions onto the
    /// locally spawned body.
    pub fn on_action_ack(&mut self, frame_id: u32, server_body_id: u32) {
        if let Some(local) = self.sim.ack_debug_action(frame_id) {
            self.id_map.insert(server_body_id, local);
            self.errors.register(local);
        }
    }

    /// Buckets a locally captured input at the current frame and returns the
    /// message to transmit. Predicted effects apply on the next tick.
    pub fn capture_action(&mut self, kind: ActionKind) -> ActionMsg {
        let action = ActionMsg {
            frame_id: self.sim.frame_id(),
            kind,
        };
        self.sim.add_action(action, self.client_id);
        action
    }

    /// One fixed-cadence simulation tick: align the frame counter with the
    /// shared clock, triage the pending sync (future frames jump the epoch
    /// forward and rebuild the window; retained frames replay from the sync
    /// point; anything older is discarded), then advance with the sync
    /// merged in at the matching frame boundary.
    pub fn tick(&mut self, now: Instant) -> AdvanceOutcome {
        let target = self.clock.current_frame(now);
        if target != self.sim.frame_id() {
            self.sim.skip_to(target);
        }

        let mut sync_to_apply = None;
        if let Some(sync) = self.pending_sync.take() {
            if sync.frame_id > self.sim.frame_id() {
                log::debug!(
                    "sync for frame {} is ahead of local frame {}, jumping epoch",
                    sync.frame_id,
                    self.sim.frame_id()
                );
                self.clock.jump_to_frame(sync.frame_id, now);
                self.sim.reset_to(sync.frame_id);
                sync_to_apply = Some(sync);
            } else if self.sim.window_contains(sync.frame_id) {
                self.sim.pull_marker_back(sync.frame_id);
                sync_to_apply = Some(sync);
            } else {
                log::debug!("discarding stale sync for frame {}", sync.frame_id);
            }
        }

        // Recognize our own debug boxes before instantiation, so an acked
        // spawn maps onto the predicted body instead of duplicating it.
        if let Some(sync) = &sync_to_apply {
            for debug_box in &sync.debug_boxes {
                if Some(debug_box.owner) == self.client_id
                    && !self.id_map.contains_key(&debug_box.body.body_id)
                {
                    if let Some(local) = self.sim.ack_debug_action(debug_box.frame_id) {
                        self.id_map.insert(debug_box.body.body_id, local);
                        self.errors.register(local);
                    }
                }
            }
        }

        let id_map = &mut self.id_map;
        let errors = &mut self.errors;
        let mut removed = Vec::new();
        let outcome = self.sim.advance(|frame, working| {
            if let Some(sync) = &sync_to_apply {
                if sync.frame_id == frame {
                    apply_sync(working, sync, id_map, errors, &mut removed);
                }
            }
        });

        if let Some(sync) = &sync_to_apply {
            self.last_applied_sync = Some(sync.frame_id);
        }
        for local in removed {
            self.errors.remove(local);
            self.id_map.retain(|_, v| *v != local);
        }

        // tear never-acknowledged debug bodies out of all retained frames
        for action in &outcome.expired {
            if matches!(action.kind, ActionKind::DebugSpawn { .. }) && !action.acked {
                if let Some(id) = action.spawn_id {
                    log::debug!("debug action expired unacknowledged, despawning {:?}", id);
                    self.sim.despawn_everywhere(id);
                    self.errors.remove(id);
                    self.id_map.retain(|_, v| *v != id);
                }
            }
        }

        outcome
    }

    pub(crate) fn render_parts(
        &mut self,
        now: Instant,
    ) -> (&Simulation, &mut ErrorMap, f32) {
        let alpha = self.clock.subframe_ratio(self.sim.frame_id(), now);
        (&self.sim, &mut self.errors, alpha)
    }
}

/// Merges an authoritative sync into the working state mid-replay:
/// never-seen entities are instantiated with a zero error offset, known ones
/// are epsilon-checked and absorbed, and hostiles the server no longer
/// reports are despawned (their local ids are pushed into `removed`).
fn apply_sync(
    working: &mut GameState,
    sync: &SyncMsg,
    id_map: &mut BTreeMap<u32, EntityId>,
    errors: &mut ErrorMap,
    removed: &mut Vec<EntityId>,
) {
    working.ship.hp = sync.ship.hp;
    let ship_local = *id_map.entry(sync.ship.body.body_id).or_insert_with(|| {
        errors.register(working.ship.id);
        working.ship.id
    });
    absorb_body(working, ship_local, &sync.ship.body, errors.offset_mut(ship_local));

    for hostile in &sync.hostiles {
        let local = match id_map.get(&hostile.body.body_id) {
            Some(&local) => local,
            None => {
                let local = working.spawn_hostile(
                    Vec2::from(hostile.body.position),
                    hostile.body.angle,
                );
                id_map.insert(hostile.body.body_id, local);
                errors.register(local);
                local
            }
        };
        if let Some(entry) = working.hostiles.get_mut(&local) {
            entry.hp = hostile.hp;
        }
        absorb_body(working, local, &hostile.body, errors.offset_mut(local));
    }

    for rock in &sync.rocks {
        let local = match id_map.get(&rock.body.body_id) {
            Some(&local) => local,
            None => {
                let local =
                    working.spawn_rock(Vec2::from(rock.body.position), rock.radius);
                id_map.insert(rock.body.body_id, local);
                errors.register(local);
                local
            }
        };
        absorb_body(working, local, &rock.body, errors.offset_mut(local));
    }

    for debug_box in &sync.debug_boxes {
        let local = match id_map.get(&debug_box.body.body_id) {
            Some(&local) => local,
            None => {
                let local = working.allocate_id();
                working.spawn_debug_box(
                    local,
                    debug_box.owner,
                    debug_box.frame_id,
                    Vec2::from(debug_box.body.position),
                    Vec2::from(debug_box.body.velocity),
                );
                id_map.insert(debug_box.body.body_id, local);
                errors.register(local);
                local
            }
        };
        absorb_body(working, local, &debug_box.body, errors.offset_mut(local));
    }

    // hostiles the server stopped reporting are gone
    let live: Vec<EntityId> = working.hostiles.keys().copied().collect();
    for local in live {
        let still_reported = sync
            .hostiles
            .iter()
            .any(|h| id_map.get(&h.body.body_id) == Some(&local));
        if !still_reported {
            working.despawn_hostile(local);
            removed.push(local);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use skiff::{BodyState, HostileState, PHYS_DT_MS, ShipState};

    fn at_frame(start: Instant, frame: u32) -> Instant {
        start + Duration::from_secs_f64(frame as f64 * PHYS_DT_MS / 1000.0)
    }

    fn ship_sync(frame_id: u32, x: f32) -> SyncMsg {
        SyncMsg {
            frame_id,
            ship: ShipState {
                body: BodyState {
                    body_id: 1,
                    position: [x, 0.0],
                    angle: 0.0,
                    velocity: [0.0, 0.0],
                    angular_velocity: 0.0,
                },
                hp: 90,
            },
            hostiles: Vec::new(),
            rocks: Vec::new(),
            debug_boxes: Vec::new(),
        }
    }

    #[test]
    fn mispredicted_ship_gains_error_offset() {
        let start = Instant::now();
        let mut game = ClientGame::new(start);
        game.set_client_id(0);

        // place the predicted ship at x = 100 with no pending offset
        let ship = game.simulation().current_state().ship.id;
        let handle = game
            .simulation()
            .current_state()
            .body_of(ship)
            .unwrap();
        game.simulation_mut()
            .current_state_mut()
            .physics
            .snap_body(handle, Vec2::new(100.0, 0.0), 0.0, Vec2::ZERO, 0.0);

        let frame = game.frame_id();
        game.on_sync(ship_sync(frame, 98.0));
        game.tick(at_frame(start, frame));

        let offset = game.error_offset(ship);
        assert!((offset.position.x - -2.0).abs() < 1e-3);
        assert_eq!(game.simulation().current_state().ship.hp, 90);
    }

    #[test]
    fn stale_sync_is_discarded() {
        let start = Instant::now();
        let mut game = ClientGame::new(start);
        game.set_client_id(0);

        for frame in 1..=10u32 {
            game.tick(at_frame(start, frame));
        }

        let hp_before = game.simulation().current_state().ship.hp;
        game.on_sync(ship_sync(2, 50.0));
        game.tick(at_frame(start, 11));

        assert_eq!(game.simulation().current_state().ship.hp, hp_before);
        let offset = game.error_offset(game.simulation().current_state().ship.id);
        assert_eq!(offset.position, Vec2::ZERO);
    }

    #[test]
    fn future_sync_jumps_epoch_forward() {
        let start = Instant::now();
        let mut game = ClientGame::new(start);
        game.set_client_id(0);
        game.tick(at_frame(start, 1));

        game.on_sync(ship_sync(400, 0.0));
        game.tick(at_frame(start, 2));

        assert_eq!(game.frame_id(), 401);
        assert_eq!(game.clock().current_frame(at_frame(start, 2)), 400);
    }

    #[test]
    fn unknown_hostile_is_instantiated_with_zero_offset() {
        let start = Instant::now();
        let mut game = ClientGame::new(start);
        game.set_client_id(0);

        let frame = game.frame_id();
        let mut sync = ship_sync(frame, 0.0);
        sync.hostiles.push(HostileState {
            body: BodyState {
                body_id: 77,
                position: [40.0, 10.0],
                angle: 0.5,
                velocity: [0.0, 0.0],
                angular_velocity: 0.0,
            },
            hp: 60,
        });
        game.on_sync(sync);
        game.tick(at_frame(start, frame));

        let local = game.local_id(77).expect("hostile instantiated");
        let state = game.simulation().current_state();
        assert_eq!(state.hostiles[&local].hp, 60);
        assert_eq!(game.error_offset(local), Default::default());
    }

    #[test]
    fn vanished_hostile_is_despawned() {
        let start = Instant::now();
        let mut game = ClientGame::new(start);
        game.set_client_id(0);

        let frame = game.frame_id();
        let mut sync = ship_sync(frame, 0.0);
        sync.hostiles.push(HostileState {
            body: BodyState {
                body_id: 77,
                position: [40.0, 10.0],
                angle: 0.0,
                velocity: [0.0, 0.0],
                angular_velocity: 0.0,
            },
            hp: 60,
        });
        game.on_sync(sync);
        game.tick(at_frame(start, frame));
        let local = game.local_id(77).unwrap();

        let next = game.frame_id();
        game.on_sync(ship_sync(next, 0.0));
        game.tick(at_frame(start, next));

        assert!(
            !game
                .simulation()
                .current_state()
                .hostiles
                .contains_key(&local)
        );
        assert!(game.local_id(77).is_none());
    }
}
