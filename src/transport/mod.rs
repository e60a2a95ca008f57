//! Capabilities consumed from the external peer-to-peer engine.
//!
//! The engine owns swarm membership, content routing, block verification and
//! micropayments. This crate only drives it through the traits below.

use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::types::LeaderPeer;

pub mod setup;

pub use setup::{SetupError, TransportSetup};

/// Byte stream for one file together with its declared size.
pub struct FileStream {
    pub size: u64,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream").field("size", &self.size).finish()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to the given leaders and returns how many new connections
    /// were made. Leaders that are already connected contribute zero.
    async fn bootstrap(&self, leaders: &[LeaderPeer]) -> usize;

    async fn fetch(&self, cid: &Cid) -> anyhow::Result<FileStream>;

    fn connected_peers(&self) -> Vec<PeerId>;
}

/// Micropayment made to a peer for data it served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub peer: String,
    pub bytes: u64,
    pub amount: String,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn ledger_entries(&self) -> anyhow::Result<Vec<LedgerEntry>>;
}

/// A running engine instance for one session.
#[derive(Clone)]
pub struct Engine {
    pub transport: Arc<dyn Transport>,
    pub ledger: Arc<dyn Ledger>,
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, setup: TransportSetup) -> anyhow::Result<Engine>;
}

/// Factory used when no engine is linked into the build. Every session that
/// gets past metadata resolution fails at transport setup.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEngine;

#[async_trait]
impl TransportFactory for NoEngine {
    async fn create(&self, setup: TransportSetup) -> anyhow::Result<Engine> {
        anyhow::bail!(
            "no peer-to-peer engine is linked into this build (peer {}, swarm {})",
            setup.keypair.public().to_peer_id(),
            setup.swarm_key.fingerprint()
        )
    }
}
