use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use skiff::clock::SyncCommand;
use skiff::map::seed_scenario;
use skiff::net::Role;
use skiff::{
    ActionKind, ActionMsg, ActionOutcome, ConnectionManager, FrameClock, GameState, Message,
    NetworkEndpoint, Packet, PacketHeader, Simulation, build_sync,
};

use crate::config::ServerConfig;

/// The authoritative game host: one fixed-cadence loop that drains the
/// socket, replays and advances the simulation, broadcasts sync, and drives
/// each connection's clock synchronizer. Never blocks on I/O mid-frame.
pub struct GameServer {
    endpoint: NetworkEndpoint,
    connections: ConnectionManager,
    config: ServerConfig,
    sim: Simulation,
    clock: FrameClock,
    running: Arc<AtomicBool>,
}

impl GameServer {
    pub fn new(bind_addr: &str, config: ServerConfig) -> io::Result<Self> {
        let endpoint = NetworkEndpoint::bind(bind_addr)?;

        let mut state = GameState::new(config.world_seed);
        seed_scenario(&mut state, config.hostile_count, config.rock_count);

        Ok(Self {
            endpoint,
            connections: ConnectionManager::with_timeout(
                config.max_clients,
                config.client_timeout,
            ),
            sim: Simulation::new(state, true),
            clock: FrameClock::start(Instant::now()),
            running: Arc::new(AtomicBool::new(true)),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn frame_id(&self) -> u32 {
        self.sim.frame_id()
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.pump() {
                log::error!("network error: {e}");
            }

            let now = Instant::now();
            let deadline = self.clock.deadline_for(self.sim.frame_id());
            if now >= deadline {
                self.tick_frame(now);
            } else {
                std::thread::sleep(
                    deadline
                        .saturating_duration_since(now)
                        .min(Duration::from_millis(1)),
                );
            }
        }

        self.shutdown();
    }

    fn shutdown(&mut self) {
        let ids: Vec<u8> = self.connections.iter().map(|c| c.client_id).collect();
        for client_id in ids {
            if let Some(client) = self.connections.get(client_id) {
                let addr = client.addr;
                self.send_to_addr(addr, 0, Message::Disconnect);
            }
            self.connections.remove(client_id);
        }
        log::info!("server stopped at frame {}", self.sim.frame_id());
    }

    /// Drains the socket and routes every pending message.
    fn pump(&mut self) -> io::Result<()> {
        let now = Instant::now();
        let packets = self.endpoint.receive()?;
        for (packet, addr) in packets {
            self.handle_message(addr, packet.message, now);
            if let Some(client) = self.connections.get_by_addr_mut(&addr) {
                client.touch(now);
            }
        }
        Ok(())
    }

    /// One frame transition, scheduled against the absolute deadline of the
    /// frame id so a late tick never skews the cadence.
    fn tick_frame(&mut self, now: Instant) {
        let outcome = self.sim.advance(|_, _| {});

        if let Some(lazer) = outcome.telemetry.lazer {
            if let Some(target) = lazer.target {
                log::debug!("lazer hit {:?} at {:?}", target, lazer.impact);
            }
        }

        let sync = build_sync(self.sim.current_state(), outcome.frame_id);
        self.broadcast(Message::Sync(sync));

        self.drive_clock_sync(now);
        self.reap_departed(now);

        if outcome.frame_id % self.config.status_log_interval == 0 {
            let stats = self.endpoint.stats();
            log::info!(
                "frame {} | {} clients | {} bodies | tx {} rx {}",
                outcome.frame_id,
                self.connections.len(),
                self.sim.current_state().physics.body_count(),
                stats.packets_sent,
                stats.packets_received,
            );
        }
    }

    fn drive_clock_sync(&mut self, now: Instant) {
        let elapsed = self.clock.elapsed_ms(now);
        let mut to_send: Vec<(SocketAddr, u32, Message)> = Vec::new();

        for client in self.connections.iter_mut() {
            if let Some(command) = client.clock.poll(now, elapsed) {
                let message = match command {
                    SyncCommand::Ping { nonce } => Message::Ping { nonce },
                    SyncCommand::Timing { game_time_ms } => Message::Timing { game_time_ms },
                };
                to_send.push((client.addr, client.next_sequence(), message));
            }
        }

        for (addr, sequence, message) in to_send {
            self.send_to_addr(addr, sequence, message);
        }
    }

    fn reap_departed(&mut self, now: Instant) {
        for client in self.connections.cleanup_timed_out(now) {
            log::info!("client {} ({}) timed out", client.client_id, client.name);
            self.release_controls(client.role);
            self.broadcast(Message::ClientLeft {
                client_id: client.client_id,
            });
        }
    }

    /// Substitutes neutral input for the control channel a departed crew
    /// member held, so the ship does not fly on with stale inputs latched.
    fn release_controls(&mut self, role: Role) {
        let neutral = match role {
            Role::Pilot => Some(ActionKind::Flight { flags: 0 }),
            Role::Gunner => Some(ActionKind::Gun {
                aim: [0.0, 0.0],
                firing: false,
            }),
            Role::Engineer | Role::Spectator => None,
        };

        if let Some(kind) = neutral {
            self.sim.add_action(
                ActionMsg {
                    frame_id: self.sim.frame_id(),
                    kind,
                },
                None,
            );
        }
    }

    fn handle_message(&mut self, addr: SocketAddr, message: Message, now: Instant) {
        match message {
            Message::Join => self.handle_join(addr, now),
            Message::SetName { name } => {
                let Some(client) = self.connections.get_by_addr_mut(&addr) else {
                    return;
                };
                client.name = name.clone();
                let client_id = client.client_id;
                self.broadcast(Message::NameChanged { client_id, name });
            }
            Message::SetRole { role } => self.handle_set_role(addr, Role::from(role)),
            Message::Action(action) => self.handle_action(addr, action),
            Message::Pong { nonce } => {
                if let Some(client) = self.connections.get_by_addr_mut(&addr) {
                    client.clock.on_pong(nonce, now);
                }
            }
            Message::Ping { nonce } => {
                self.send_to_addr(addr, 0, Message::Pong { nonce });
            }
            Message::Disconnect => {
                let Some(client) = self.connections.get_by_addr(&addr) else {
                    return;
                };
                let client_id = client.client_id;
                if let Some(client) = self.connections.remove(client_id) {
                    log::info!("client {} ({}) left", client.client_id, client.name);
                    self.release_controls(client.role);
                    self.broadcast(Message::ClientLeft { client_id });
                }
            }
            // server-bound traffic only
            _ => {}
        }
    }

    fn handle_join(&mut self, addr: SocketAddr, now: Instant) {
        match self.connections.join(addr, now) {
            Ok(client) => {
                let client_id = client.client_id;
                let name = client.name.clone();
                let sequence = client.next_sequence();
                log::info!("client {client_id} joined from {addr}");

                let welcome = Message::Welcome {
                    client_id,
                    frame_id: self.sim.frame_id(),
                    roster: self.connections.roster(),
                    names: self.connections.names(),
                };
                self.send_to_addr(addr, sequence, welcome);
                self.broadcast_except(client_id, Message::ClientJoined { client_id, name });
            }
            Err(reason) => {
                log::warn!("join from {addr} denied: {reason}");
                self.send_to_addr(
                    addr,
                    0,
                    Message::JoinDenied {
                        reason: reason.to_owned(),
                    },
                );
            }
        }
    }

    fn handle_set_role(&mut self, addr: SocketAddr, role: Role) {
        let Some(client) = self.connections.get_by_addr(&addr) else {
            return;
        };
        let client_id = client.client_id;
        let previous = client.role;

        if self.connections.try_assign_role(client_id, role) {
            if previous.is_exclusive() && previous != role {
                self.release_controls(previous);
            }
            self.broadcast(Message::RoleAssigned {
                client_id,
                role: role as u8,
            });
        } else {
            // lost the race: re-assert the authoritative holder
            if let Some(holder) = self.connections.role_holder(role) {
                self.send_to_addr(
                    addr,
                    0,
                    Message::RoleAssigned {
                        client_id: holder,
                        role: role as u8,
                    },
                );
            }
        }
    }

    fn handle_action(&mut self, addr: SocketAddr, action: ActionMsg) {
        let Some(client) = self.connections.get_by_addr(&addr) else {
            return;
        };
        let client_id = client.client_id;
        let role = client.role;

        if !role_allows(role, &action.kind) {
            log::debug!(
                "client {client_id} sent {:?} without holding the station",
                action.kind
            );
            return;
        }

        match self.sim.add_action(action, Some(client_id)) {
            ActionOutcome::Accepted { spawn_id } => {
                if let Some(spawn_id) = spawn_id {
                    self.send_to_addr(
                        addr,
                        0,
                        Message::ActionAck {
                            frame_id: action.frame_id,
                            body_id: spawn_id.0,
                        },
                    );
                }
            }
            ActionOutcome::Expired => {
                log::debug!(
                    "client {client_id} action for frame {} expired (now {})",
                    action.frame_id,
                    self.sim.frame_id()
                );
            }
        }
    }

    fn broadcast(&mut self, message: Message) {
        let targets: Vec<(SocketAddr, u32)> = self
            .connections
            .iter_mut()
            .map(|c| (c.addr, c.next_sequence()))
            .collect();
        for (addr, sequence) in targets {
            self.send_to_addr(addr, sequence, message.clone());
        }
    }

    fn broadcast_except(&mut self, skip: u8, message: Message) {
        let targets: Vec<(SocketAddr, u32)> = self
            .connections
            .iter_mut()
            .filter(|c| c.client_id != skip)
            .map(|c| (c.addr, c.next_sequence()))
            .collect();
        for (addr, sequence) in targets {
            self.send_to_addr(addr, sequence, message.clone());
        }
    }

    fn send_to_addr(&mut self, addr: SocketAddr, sequence: u32, message: Message) {
        let packet = Packet::new(PacketHeader::new(sequence), message);
        if let Err(e) = self.endpoint.send_to(&packet, addr) {
            log::warn!("send to {addr} failed: {e}");
        }
    }
}

fn role_allows(role: Role, kind: &ActionKind) -> bool {
    match kind {
        ActionKind::Flight { .. } => role == Role::Pilot,
        ActionKind::Gun { .. } => role == Role::Gunner,
        ActionKind::Power { .. } | ActionKind::Waypoint { .. } => role == Role::Engineer,
        ActionKind::DebugSpawn { .. } => role != Role::Spectator,
    }
}
