use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use skiff::{
    ActionKind, Message, NetworkEndpoint, Packet, PacketHeader, Role, net::NetworkStats,
};

use crate::game::ClientGame;

#[derive(Debug, Clone)]
pub struct CrewMate {
    pub name: String,
    pub role: Role,
}

/// Connection-facing side of the client: multiplexes all message families
/// over one endpoint, keeps the crew roster, and feeds simulation-relevant
/// messages into the `ClientGame`.
pub struct ClientSession {
    endpoint: NetworkEndpoint,
    game: ClientGame,
    send_sequence: u32,
    roster: BTreeMap<u8, CrewMate>,
    connected: bool,
}

impl ClientSession {
    pub fn connect(server: SocketAddr, now: Instant) -> io::Result<Self> {
        let mut endpoint = NetworkEndpoint::bind("0.0.0.0:0")?;
        endpoint.set_remote(server);

        let mut session = Self {
            endpoint,
            game: ClientGame::new(now),
            send_sequence: 0,
            roster: BTreeMap::new(),
            connected: false,
        };
        session.send(Message::Join)?;
        log::info!("joining {server}");
        Ok(session)
    }

    pub fn game(&self) -> &ClientGame {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut ClientGame {
        &mut self.game
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn roster(&self) -> &BTreeMap<u8, CrewMate> {
        &self.roster
    }

    pub fn stats(&self) -> &NetworkStats {
        self.endpoint.stats()
    }

    fn send(&mut self, message: Message) -> io::Result<()> {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        self.endpoint
            .send(&Packet::new(PacketHeader::new(sequence), message))?;
        Ok(())
    }

    /// Captures a local input: predicted immediately, transmitted to the
    /// authority tagged with the frame it applies to.
    pub fn send_action(&mut self, kind: ActionKind) -> io::Result<()> {
        let action = self.game.capture_action(kind);
        self.send(Message::Action(action))
    }

    pub fn set_name(&mut self, name: &str) -> io::Result<()> {
        self.send(Message::SetName {
            name: name.to_owned(),
        })
    }

    pub fn request_role(&mut self, role: Role) -> io::Result<()> {
        self.send(Message::SetRole { role: role as u8 })
    }

    pub fn disconnect(&mut self) -> io::Result<()> {
        self.connected = false;
        self.send(Message::Disconnect)
    }

    /// Drains the socket and routes every message. Call once per simulation
    /// tick, before `ClientGame::tick`.
    pub fn poll(&mut self, now: Instant) -> io::Result<()> {
        let packets = self.endpoint.receive()?;
        for (packet, _addr) in packets {
            self.handle(packet.message, now)?;
        }
        Ok(())
    }

    fn handle(&mut self, message: Message, now: Instant) -> io::Result<()> {
        match message {
            Message::Welcome {
                client_id,
                frame_id,
                roster,
                names,
            } => {
                log::info!("joined as client {client_id} at server frame {frame_id}");
                self.connected = true;
                self.game.set_client_id(client_id);
                self.roster = roster
                    .iter()
                    .zip(names)
                    .map(|(entry, name)| {
                        (
                            entry.client_id,
                            CrewMate {
                                name,
                                role: Role::from(entry.role),
                            },
                        )
                    })
                    .collect();
            }
            Message::JoinDenied { reason } => {
                log::warn!("join denied: {reason}");
                self.connected = false;
            }
            Message::ClientJoined { client_id, name } => {
                self.roster.insert(
                    client_id,
                    CrewMate {
                        name,
                        role: Role::Spectator,
                    },
                );
            }
            Message::ClientLeft { client_id } => {
                self.roster.remove(&client_id);
            }
            Message::NameChanged { client_id, name } => {
                if let Some(mate) = self.roster.get_mut(&client_id) {
                    mate.name = name;
                }
            }
            Message::RoleAssigned { client_id, role } => {
                if let Some(mate) = self.roster.get_mut(&client_id) {
                    mate.role = Role::from(role);
                }
            }
            Message::ActionAck { frame_id, body_id } => {
                self.game.on_action_ack(frame_id, body_id);
            }
            Message::Sync(sync) => {
                self.game.on_sync(sync);
            }
            Message::Timing { game_time_ms } => {
                self.game.on_timing(now, game_time_ms);
            }
            Message::Ping { nonce } => {
                self.send(Message::Pong { nonce })?;
            }
            Message::Disconnect => {
                log::info!("disconnected by server");
                self.connected = false;
            }
            // client-bound traffic only; anything else is not for us
            _ => {}
        }
        Ok(())
    }
}
