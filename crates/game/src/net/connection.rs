use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::clock::ClockSync;
use crate::net::protocol::RosterEntry;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Crew stations. Exactly one non-observer client may hold each station at
/// a time; the spectator seat is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Role {
    #[default]
    Spectator = 0,
    Pilot = 1,
    Gunner = 2,
    Engineer = 3,
}

impl From<u8> for Role {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Pilot,
            2 => Self::Gunner,
            3 => Self::Engineer,
            _ => Self::Spectator,
        }
    }
}

impl Role {
    pub fn is_exclusive(self) -> bool {
        self != Role::Spectator
    }
}

/// Server-side record of one connected client.
#[derive(Debug)]
pub struct RemoteClient {
    pub addr: SocketAddr,
    pub client_id: u8,
    pub name: String,
    pub role: Role,
    pub last_receive: Instant,
    pub send_sequence: u32,
    pub clock: ClockSync,
}

impl RemoteClient {
    fn new(addr: SocketAddr, client_id: u8, now: Instant) -> Self {
        Self {
            addr,
            client_id,
            name: format!("crew-{client_id}"),
            role: Role::Spectator,
            last_receive: now,
            send_sequence: 0,
            clock: ClockSync::new(),
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_receive = now;
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_receive) > timeout
    }

    pub fn next_sequence(&mut self) -> u32 {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        sequence
    }
}

/// Connection table with a bounded id pool: client ids fit in a byte on the
/// wire and are recycled when a slot frees up. Also the authority for role
/// assignment, which is a check-then-set against the current holders.
#[derive(Debug)]
pub struct ConnectionManager {
    by_addr: HashMap<SocketAddr, u8>,
    clients: BTreeMap<u8, RemoteClient>,
    max_clients: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            by_addr: HashMap::new(),
            clients: BTreeMap::new(),
            max_clients: max_clients.min(u8::MAX as usize),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::new(max_clients)
        }
    }

    /// Admits a new client, reusing the lowest free id. Re-joining from an
    /// already-known address returns the existing record.
    pub fn join(&mut self, addr: SocketAddr, now: Instant) -> Result<&mut RemoteClient, &'static str> {
        if let Some(&client_id) = self.by_addr.get(&addr) {
            return Ok(self.clients.get_mut(&client_id).unwrap());
        }

        if self.clients.len() >= self.max_clients {
            return Err("crew roster is full");
        }

        let client_id = (0..self.max_clients as u8)
            .find(|id| !self.clients.contains_key(id))
            .expect("roster below capacity");

        self.by_addr.insert(addr, client_id);
        self.clients
            .insert(client_id, RemoteClient::new(addr, client_id, now));
        Ok(self.clients.get_mut(&client_id).unwrap())
    }

    pub fn remove(&mut self, client_id: u8) -> Option<RemoteClient> {
        let client = self.clients.remove(&client_id)?;
        self.by_addr.remove(&client.addr);
        Some(client)
    }

    pub fn get(&self, client_id: u8) -> Option<&RemoteClient> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u8) -> Option<&mut RemoteClient> {
        self.clients.get_mut(&client_id)
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&RemoteClient> {
        self.by_addr.get(addr).and_then(|id| self.clients.get(id))
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut RemoteClient> {
        match self.by_addr.get(addr) {
            Some(&id) => self.clients.get_mut(&id),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteClient> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RemoteClient> {
        self.clients.values_mut()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Check-then-set role assignment: an exclusive station already held by
    /// another client refuses the request. Stepping down to spectator always
    /// succeeds.
    pub fn try_assign_role(&mut self, client_id: u8, role: Role) -> bool {
        if !self.clients.contains_key(&client_id) {
            return false;
        }

        if role.is_exclusive() {
            let taken = self
                .clients
                .values()
                .any(|c| c.client_id != client_id && c.role == role);
            if taken {
                return false;
            }
        }

        self.clients.get_mut(&client_id).unwrap().role = role;
        true
    }

    pub fn role_holder(&self, role: Role) -> Option<u8> {
        self.clients
            .values()
            .find(|c| c.role == role)
            .map(|c| c.client_id)
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.clients
            .values()
            .map(|c| RosterEntry {
                client_id: c.client_id,
                role: c.role as u8,
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.clients.values().map(|c| c.name.clone()).collect()
    }

    pub fn cleanup_timed_out(&mut self, now: Instant) -> Vec<RemoteClient> {
        let expired: Vec<u8> = self
            .clients
            .values()
            .filter(|c| c.is_timed_out(now, self.timeout) || c.clock.is_closed())
            .map(|c| c.client_id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn ids_come_from_a_bounded_pool() {
        let now = Instant::now();
        let mut connections = ConnectionManager::new(2);

        let a = connections.join(addr(1000), now).unwrap().client_id;
        let b = connections.join(addr(1001), now).unwrap().client_id;
        assert_eq!((a, b), (0, 1));
        assert!(connections.join(addr(1002), now).is_err());

        connections.remove(a);
        let c = connections.join(addr(1003), now).unwrap().client_id;
        assert_eq!(c, 0);
    }

    #[test]
    fn exclusive_roles_are_check_then_set() {
        let now = Instant::now();
        let mut connections = ConnectionManager::new(4);
        let a = connections.join(addr(1000), now).unwrap().client_id;
        let b = connections.join(addr(1001), now).unwrap().client_id;

        assert!(connections.try_assign_role(a, Role::Pilot));
        assert!(!connections.try_assign_role(b, Role::Pilot));
        assert!(connections.try_assign_role(b, Role::Gunner));

        // the pilot stepping down frees the station
        assert!(connections.try_assign_role(a, Role::Spectator));
        assert!(connections.try_assign_role(b, Role::Pilot));
    }

    #[test]
    fn spectators_are_unbounded() {
        let now = Instant::now();
        let mut connections = ConnectionManager::new(4);
        for port in 0..3 {
            let id = connections.join(addr(2000 + port), now).unwrap().client_id;
            assert!(connections.try_assign_role(id, Role::Spectator));
        }
    }

    #[test]
    fn timed_out_clients_are_reaped() {
        let now = Instant::now();
        let mut connections =
            ConnectionManager::with_timeout(4, Duration::from_secs(1));
        let id = connections.join(addr(1000), now).unwrap().client_id;

        let later = now + Duration::from_secs(2);
        let removed = connections.cleanup_timed_out(later);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].client_id, id);
        assert!(connections.is_empty());
    }
}
