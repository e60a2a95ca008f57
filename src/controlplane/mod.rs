pub mod client;
pub mod envelope;
pub mod external_ip;

pub use client::{ControlPlaneClient, DEFAULT_API_ADDR};
pub use external_ip::ExternalIpResolver;

#[derive(thiserror::Error, Debug)]
pub enum ControlPlaneError {
    #[error("Request to control plane failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Control plane answered with HTTP {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("Malformed control plane response: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("{details}")]
    Rejected { status: i64, details: String },
}
