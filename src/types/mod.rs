pub mod metadata;

pub use metadata::{Cookie, DownloadMetadata, LeaderPeer};
