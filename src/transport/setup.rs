use std::str::FromStr;

use libp2p::{
    identity::Keypair,
    pnet::{KeyParseError, PreSharedKey},
    Multiaddr,
};

use crate::types::DownloadMetadata;

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("Swarm key is not valid UTF-8: {0}")]
    SwarmKeyEncoding(#[source] std::str::Utf8Error),
    #[error("Failed decoding swarm key provided: {0}")]
    SwarmKey(#[source] KeyParseError),
    #[error("Invalid listen address {addr:?}: {source}")]
    ListenAddr {
        addr: String,
        #[source]
        source: libp2p::multiaddr::Error,
    },
}

/// Everything an engine needs to join the private swarm of one download.
#[derive(Debug, Clone)]
pub struct TransportSetup {
    pub keypair: Keypair,
    pub swarm_key: PreSharedKey,
    pub listen_addrs: Vec<Multiaddr>,
    pub download_index: String,
    pub rate: String,
}

impl TransportSetup {
    pub fn from_metadata(
        metadata: &DownloadMetadata,
        keypair: &Keypair,
        listen_addrs: &[String],
    ) -> Result<Self, SetupError> {
        let swarm_key = decode_swarm_key(&metadata.swarm_key)?;
        let listen_addrs = listen_addrs
            .iter()
            .map(|addr| {
                addr.parse().map_err(|source| SetupError::ListenAddr {
                    addr: addr.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            swarm = %swarm_key.fingerprint(),
            listen = ?listen_addrs,
            download_index = %metadata.cookie.download_index,
            rate = %metadata.rate,
            "prepared transport setup"
        );
        Ok(Self {
            keypair: keypair.clone(),
            swarm_key,
            listen_addrs,
            download_index: metadata.cookie.download_index.clone(),
            rate: metadata.rate.clone(),
        })
    }
}

/// Decodes a go-libp2p v1 swarm key document (`/key/swarm/psk/1.0.0/`).
pub fn decode_swarm_key(bytes: &[u8]) -> Result<PreSharedKey, SetupError> {
    let text = std::str::from_utf8(bytes).map_err(SetupError::SwarmKeyEncoding)?;
    PreSharedKey::from_str(text.trim()).map_err(SetupError::SwarmKey)
}
