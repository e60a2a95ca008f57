use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use libp2p::identity::PublicKey;
use tokio::sync::OnceCell;

use crate::controlplane::{
    envelope::{self, Command},
    external_ip::ExternalIpResolver,
    ControlPlaneError,
};
use crate::logging::redact_b64;
use crate::types::DownloadMetadata;

pub const DEFAULT_API_ADDR: &str = "http://35.190.76.147/v3/execute";

pub type Result<T> = std::result::Result<T, ControlPlaneError>;

pub struct ControlPlaneClient {
    http: reqwest::Client,
    endpoint: String,
    ip_resolver: ExternalIpResolver,
    source_ip: OnceCell<String>,
}

impl ControlPlaneClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            ip_resolver: ExternalIpResolver::default(),
            source_ip: OnceCell::new(),
        }
    }

    pub fn with_ip_resolver(mut self, resolver: ExternalIpResolver) -> Self {
        self.ip_resolver = resolver;
        self
    }

    /// Resolved once per client and reused by later metadata refreshes.
    pub async fn resolve_external_ip(&self) -> &str {
        self.source_ip
            .get_or_init(|| self.ip_resolver.resolve())
            .await
            .as_str()
    }

    pub async fn fetch_metadata(
        &self,
        sharable: &str,
        previous_cookie: Option<&str>,
        public_key: &PublicKey,
    ) -> Result<DownloadMetadata> {
        let public_key = STANDARD.encode(public_key.encode_protobuf());
        let source_ip = self.resolve_external_ip().await;
        tracing::debug!(
            sharable,
            public_key = %redact_b64(&public_key),
            source_ip,
            cookie = previous_cookie.unwrap_or_default(),
            "fetching download metadata"
        );
        let cmd = Command::fetch(sharable, &public_key, source_ip, previous_cookie);
        let body = self.execute(&cmd).await?;
        envelope::decode_data(&body)
    }

    pub async fn report_completion(&self, cookie_id: &str, elapsed: Duration) -> Result<()> {
        let cmd = Command::complete(cookie_id, elapsed.as_secs());
        let body = self.execute(&cmd).await?;
        envelope::decode_reply(&body)?;
        tracing::debug!(
            cookie = cookie_id,
            elapsed_secs = elapsed.as_secs(),
            "completion reported"
        );
        Ok(())
    }

    async fn execute(&self, cmd: &Command) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&cmd.to_envelope())
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        // Error replies normally still carry an envelope; only fall back to
        // the HTTP status when they don't.
        if !status.is_success() && envelope::decode_reply(&body).is_err() {
            return Err(ControlPlaneError::HttpStatus(status));
        }
        Ok(body)
    }
}
