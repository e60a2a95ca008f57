//! Uniform `{status, message, detail, data}` record printed on stdout.

use serde::Serialize;
use serde_json::{json, Value};

use crate::controller::progress::ProgressSample;
use crate::session::{result::SessionResult, state::SessionState};

pub const STATUS_OK: u16 = 200;

const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Out {
    pub status: u16,
    pub message: String,
    pub detail: String,
    pub data: Value,
}

impl Out {
    pub fn new(
        status: u16,
        message: impl Into<String>,
        detail: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            detail: detail.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(1, message, "", Value::Null)
    }

    pub fn progress(sample: &ProgressSample) -> Self {
        let text = format!(
            "{}% ({:.2}MB / {:.2}MB)",
            sample.percent,
            sample.downloaded as f64 / MB,
            sample.total as f64 / MB
        );
        Self::new(STATUS_OK, "Progress", "", Value::String(text))
    }

    /// Notification for a step of the session the user can follow along with.
    pub fn step(state: SessionState) -> Self {
        let message = match state {
            SessionState::Idle => "Idle",
            SessionState::FetchingMetadata => "Fetching download info",
            SessionState::CreatingDestination => "Creating destination file",
            SessionState::SettingUpTransport => "Setting up p2p peer",
            SessionState::Bootstrapping => "Connecting to leaders",
            SessionState::AwaitingPeers => "Waiting for peers",
            SessionState::Downloading => "Downloading",
            SessionState::Finalizing => "Finalizing download",
            SessionState::MetadataReported => "Download info ready",
            SessionState::Succeeded => "Download complete",
            SessionState::StatReported => "Download stats ready",
            SessionState::Failed => "Session failed",
        };
        Self::new(STATUS_OK, message, "", Value::Null)
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// One JSON object per line, or human-readable text.
    pub fn render(&self, json: bool) -> String {
        if json {
            return json!({
                "status": self.status,
                "message": self.message,
                "detail": self.detail,
                "data": self.data,
            })
            .to_string();
        }

        let mut text = String::new();
        if !self.is_success() {
            text.push_str("ERR: ");
        }
        text.push_str(&self.message);
        if !self.detail.is_empty() {
            text.push_str(": ");
            text.push_str(&self.detail);
        }
        match &self.data {
            Value::Null => {}
            Value::String(s) => {
                text.push(' ');
                text.push_str(s);
            }
            other => text.push_str(&format!("\n{other:#}")),
        }
        text
    }
}

impl From<&SessionResult> for Out {
    fn from(result: &SessionResult) -> Self {
        match result {
            SessionResult::MetadataOnly(metadata) => {
                Self::new(STATUS_OK, "Download info", "", to_data(metadata))
            }
            SessionResult::DownloadSuccess => {
                Self::new(STATUS_OK, "Download successful", "", Value::Null)
            }
            SessionResult::StatSnapshot(stats) => {
                Self::new(STATUS_OK, "Download stats", "", to_data(stats))
            }
            SessionResult::Failure(failure) => Self::new(
                failure.code,
                failure.message.clone(),
                failure.detail.clone(),
                Value::Null,
            ),
        }
    }
}

fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "result payload not serializable");
        Value::Null
    })
}
