use base64::{engine::general_purpose::STANDARD, Engine};
use libp2p::{Multiaddr, PeerId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Peer recommended by the control plane as an initial swarm contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderPeer {
    #[serde(rename = "ID")]
    pub id: PeerId,
    #[serde(rename = "Addrs", default, deserialize_with = "null_as_empty")]
    pub addrs: Vec<Multiaddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cookie {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub leaders: Vec<LeaderPeer>,
    #[serde(default)]
    pub download_index: String,
    pub filename: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Everything the control plane hands out for one sharable token.
///
/// The swarm key travels as base64 on the wire and may be `null` when the
/// control plane has nothing to share; that decodes to an empty key, which
/// the transport setup rejects later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DownloadMetadata {
    pub cookie: Cookie,
    #[serde(default, with = "base64_bytes")]
    pub swarm_key: Vec<u8>,
    #[serde(default)]
    pub rate: String,
}

impl DownloadMetadata {
    pub fn cookie_id(&self) -> &str {
        &self.cookie.id
    }

    pub fn leaders(&self) -> &[LeaderPeer] {
        &self.cookie.leaders
    }

    pub fn filename(&self) -> &str {
        &self.cookie.filename
    }

    pub fn content_hash(&self) -> &str {
        &self.cookie.hash
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
