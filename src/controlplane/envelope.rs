use itertools::Itertools;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::controlplane::ControlPlaneError;

pub const CMD_SEPARATOR: &str = "%$#";
pub const STATUS_OK: i64 = 200;

/// Body of every control-plane request and the outer layer of every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub val: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Reply {
    status: i64,
    #[serde(default)]
    details: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A `hive` command line, encoded as separator-joined tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    tokens: Vec<String>,
}

impl Command {
    pub fn fetch(
        sharable: &str,
        public_key_b64: &str,
        source_ip: &str,
        previous_cookie: Option<&str>,
    ) -> Self {
        let mut cmd = Self::hive("fetch").args([
            sharable,
            "--public-key",
            public_key_b64,
            "--source-ip",
            source_ip,
            "-j",
        ]);
        if let Some(cookie) = previous_cookie.filter(|c| !c.is_empty()) {
            cmd = cmd.args(["--cookie", cookie]);
        }
        cmd
    }

    pub fn complete(cookie_id: &str, elapsed_secs: u64) -> Self {
        Self::hive("complete").args([cookie_id, &elapsed_secs.to_string(), "-j"])
    }

    fn hive(verb: &str) -> Self {
        Self {
            tokens: vec!["hive".to_owned(), "customer".to_owned(), verb.to_owned()],
        }
    }

    fn args<'a>(mut self, args: impl IntoIterator<Item = &'a str>) -> Self {
        self.tokens.extend(args.into_iter().map(str::to_owned));
        self
    }

    pub fn encode(&self) -> String {
        self.tokens.iter().join(CMD_SEPARATOR)
    }

    pub fn to_envelope(&self) -> Envelope {
        Envelope { val: self.encode() }
    }
}

/// Wraps a reply into the double-encoded form the control plane answers with.
pub fn encode_reply<T: Serialize>(
    status: i64,
    details: &str,
    data: &T,
) -> Result<Vec<u8>, serde_json::Error> {
    let inner = serde_json::to_string(&Reply {
        status,
        details: details.to_owned(),
        data: serde_json::to_value(data)?,
    })?;
    serde_json::to_vec(&Envelope { val: inner })
}

/// Unwraps both JSON layers and returns the `data` payload of a successful reply.
pub fn decode_reply(body: &[u8]) -> Result<serde_json::Value, ControlPlaneError> {
    let outer: Envelope = serde_json::from_slice(body).map_err(ControlPlaneError::Malformed)?;
    tracing::debug!(response = %outer.val, "control plane reply");
    let reply: Reply = serde_json::from_str(&outer.val).map_err(ControlPlaneError::Malformed)?;
    if reply.status != STATUS_OK {
        let details = if reply.details.is_empty() {
            format!("Invalid status from server: {}", reply.status)
        } else {
            reply.details
        };
        return Err(ControlPlaneError::Rejected {
            status: reply.status,
            details,
        });
    }
    Ok(reply.data)
}

pub fn decode_data<T: DeserializeOwned>(body: &[u8]) -> Result<T, ControlPlaneError> {
    serde_json::from_value(decode_reply(body)?).map_err(ControlPlaneError::Malformed)
}
