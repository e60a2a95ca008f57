use std::time::Duration;

use camino::Utf8PathBuf;
use libp2p::identity::Keypair;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

lazy_static::lazy_static! {
    static ref PEER_THRESHOLD: usize = std::env::var("LIGHT_CLIENT_PEER_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    static ref LISTEN_ADDR: String = std::env::var("LIGHT_CLIENT_LISTEN_ADDR")
        .unwrap_or_else(|_| "/ip4/0.0.0.0/tcp/45000".to_owned());
}

/// Timing and sizing knobs of a session.
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Connected peers wanted before lagged bootstrapping stops.
    pub peer_threshold: usize,
    pub retry_interval: Duration,
    /// How long lagged bootstrapping may go on, measured from session start.
    pub retry_budget: Duration,
    pub peer_poll_interval: Duration,
    pub progress_interval: Duration,
    /// Pause after the copy so the engine can flush payments tied to it.
    /// The engine exposes no quiescence signal, so this stays a fixed delay.
    pub ledger_grace: Duration,
    pub listen_addrs: Vec<String>,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            peer_threshold: *PEER_THRESHOLD,
            retry_interval: Duration::from_secs(30),
            retry_budget: Duration::from_secs(15 * 60),
            peer_poll_interval: Duration::from_secs(1),
            progress_interval: Duration::from_millis(500),
            ledger_grace: Duration::from_secs(5),
            listen_addrs: vec![LISTEN_ADDR.clone()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory the downloaded file is written into.
    pub destination: Utf8PathBuf,
    pub timeout: Duration,
    pub identity: Keypair,
    pub tunables: Tunables,
}

impl SessionConfig {
    /// Generates a fresh identity for every client instance.
    pub fn new(destination: impl Into<Utf8PathBuf>, timeout: Duration) -> Self {
        Self {
            destination: destination.into(),
            timeout,
            identity: Keypair::generate_ed25519(),
            tunables: Tunables::default(),
        }
    }

    pub fn with_tunables(mut self, tunables: Tunables) -> Self {
        self.tunables = tunables;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_config_gets_its_own_identity() {
        let a = SessionConfig::new(".", DEFAULT_TIMEOUT);
        let b = SessionConfig::new(".", DEFAULT_TIMEOUT);
        assert_ne!(
            a.identity.public().to_peer_id(),
            b.identity.public().to_peer_id()
        );
    }

    #[test]
    fn defaults_match_the_documented_cadence() {
        let t = Tunables::default();
        assert_eq!(t.retry_interval, Duration::from_secs(30));
        assert_eq!(t.retry_budget, Duration::from_secs(900));
        assert_eq!(t.peer_poll_interval, Duration::from_secs(1));
        assert_eq!(t.progress_interval, Duration::from_millis(500));
        assert_eq!(t.ledger_grace, Duration::from_secs(5));
        assert_eq!(t.listen_addrs.len(), 1);
    }
}
