use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::controlplane::ControlPlaneError;
use crate::transport::LedgerEntry;
use crate::types::DownloadMetadata;

/// The one value a session hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum SessionResult {
    MetadataOnly(DownloadMetadata),
    DownloadSuccess,
    StatSnapshot(StatSnapshot),
    Failure(Failure),
}

impl SessionResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure(_))
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failure(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

impl From<SessionError> for SessionResult {
    fn from(err: SessionError) -> Self {
        Self::Failure(Failure::from(&err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub connected_peers: Vec<String>,
    pub ledger_entries: Vec<LedgerEntry>,
    pub download_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub code: u16,
    pub message: String,
    pub detail: String,
}

impl From<&SessionError> for Failure {
    fn from(err: &SessionError) -> Self {
        Self {
            kind: err.kind(),
            code: err.code(),
            message: err.message().to_owned(),
            detail: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ControlPlane,
    Destination,
    TransportSetup,
    NoPeersAvailable,
    InvalidContentHash,
    Transfer,
    SessionTimeout,
    SessionCancelled,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
    #[error("Cannot create {path}: {source}")]
    Destination {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:#}")]
    TransportSetup(anyhow::Error),
    #[error("No peers connected before the session deadline")]
    NoPeersAvailable,
    #[error("Invalid content hash {hash:?}: {reason}")]
    InvalidContentHash { hash: String, reason: String },
    #[error("{0:#}")]
    Transfer(anyhow::Error),
    #[error("Session deadline exceeded")]
    SessionTimeout,
    #[error("Session cancelled")]
    SessionCancelled,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ControlPlane(_) => ErrorKind::ControlPlane,
            Self::Destination { .. } => ErrorKind::Destination,
            Self::TransportSetup(_) => ErrorKind::TransportSetup,
            Self::NoPeersAvailable => ErrorKind::NoPeersAvailable,
            Self::InvalidContentHash { .. } => ErrorKind::InvalidContentHash,
            Self::Transfer(_) => ErrorKind::Transfer,
            Self::SessionTimeout => ErrorKind::SessionTimeout,
            Self::SessionCancelled => ErrorKind::SessionCancelled,
        }
    }

    pub fn code(&self) -> u16 {
        match self.kind() {
            ErrorKind::ControlPlane => 502,
            ErrorKind::Destination | ErrorKind::TransportSetup | ErrorKind::Transfer => 500,
            ErrorKind::NoPeersAvailable => 503,
            ErrorKind::InvalidContentHash => 400,
            ErrorKind::SessionTimeout => 504,
            ErrorKind::SessionCancelled => 499,
        }
    }

    pub fn message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::ControlPlane => "Failed getting metadata",
            ErrorKind::Destination => "Failed creating destination file",
            ErrorKind::TransportSetup => "Failed setting up p2p peer",
            ErrorKind::NoPeersAvailable => "Stopped while waiting for peers",
            ErrorKind::InvalidContentHash => "Failed decoding filehash provided",
            ErrorKind::Transfer => "Failed writing to destination",
            ErrorKind::SessionTimeout => "Session deadline exceeded",
            ErrorKind::SessionCancelled => "Session cancelled",
        }
    }
}
