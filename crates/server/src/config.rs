use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_clients: usize,
    pub client_timeout: Duration,
    pub world_seed: u64,
    pub hostile_count: u32,
    pub rock_count: u32,
    /// How often to log a one-line status summary, in frames.
    pub status_log_interval: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 8,
            client_timeout: Duration::from_secs(30),
            world_seed: 0x5349_4646,
            hostile_count: 3,
            rock_count: 24,
            status_log_interval: 40 * 30,
        }
    }
}
