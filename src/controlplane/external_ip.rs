use std::{net::IpAddr, time::Duration};

use futures::future::join_all;
use itertools::Itertools;

pub const FALLBACK_IP: &str = "0.0.0.0";

pub const DEFAULT_SOURCES: &[&str] = &[
    "https://api.ipify.org",
    "https://ifconfig.me/ip",
    "https://icanhazip.com",
    "https://ipinfo.io/ip",
];

/// Asks a handful of plain-text "what is my IP" services and keeps the answer
/// most of them agree on.
#[derive(Debug, Clone)]
pub struct ExternalIpResolver {
    http: reqwest::Client,
    sources: Vec<String>,
    timeout: Duration,
}

impl Default for ExternalIpResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect())
    }
}

impl ExternalIpResolver {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            sources,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Never fails; the address is informational only.
    pub async fn resolve(&self) -> String {
        let answers = join_all(self.sources.iter().map(|source| self.query(source))).await;
        match consensus(answers.into_iter().flatten()) {
            Some(ip) => ip.to_string(),
            None => {
                tracing::debug!(
                    sources = self.sources.len(),
                    "could not determine external IP, using fallback"
                );
                FALLBACK_IP.to_owned()
            }
        }
    }

    async fn query(&self, source: &str) -> Option<IpAddr> {
        let response = self
            .http
            .get(source)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        let body = match response {
            Ok(response) => response.text().await.ok()?,
            Err(err) => {
                tracing::debug!(source, error = %err, "external IP source failed");
                return None;
            }
        };
        body.trim().parse().ok()
    }
}

/// Most frequent answer wins; ties go to the lowest address so the pick is stable.
fn consensus(answers: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    answers
        .into_iter()
        .counts()
        .into_iter()
        .max_by(|(ip_a, n_a), (ip_b, n_b)| n_a.cmp(n_b).then_with(|| ip_b.cmp(ip_a)))
        .map(|(ip, _)| ip)
}
