use std::time::Duration;

use crate::controller::deadline::Deadline;
use crate::controlplane::ControlPlaneClient;
use crate::session::result::{SessionResult, StatSnapshot};
use crate::transport::Engine;

/// Wraps up a finished copy. Nothing in here can turn a successful download
/// into a failure: completion reporting and the ledger read are best-effort.
pub struct Finalizer<'a> {
    pub control: &'a ControlPlaneClient,
    pub engine: &'a Engine,
    pub ledger_grace: Duration,
}

impl Finalizer<'_> {
    pub async fn finalize(
        &self,
        cookie_id: &str,
        elapsed: Duration,
        want_stats: bool,
        deadline: &Deadline,
    ) -> SessionResult {
        // The engine has no "payments flushed" signal; wait a fixed grace period instead.
        tokio::time::sleep(self.ledger_grace).await;

        match deadline
            .guard(self.control.report_completion(cookie_id, elapsed))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Failed updating metadata after download")
            }
            Err(err) => tracing::warn!(error = %err, "completion report interrupted"),
        }

        if !want_stats {
            return SessionResult::DownloadSuccess;
        }

        let connected_peers = self
            .engine
            .transport
            .connected_peers()
            .iter()
            .map(ToString::to_string)
            .collect();
        let ledger_entries = match deadline.guard(self.engine.ledger.ledger_entries()).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Failed reading ledger entries");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "ledger read interrupted");
                Vec::new()
            }
        };
        SessionResult::StatSnapshot(StatSnapshot {
            connected_peers,
            ledger_entries,
            download_seconds: elapsed.as_secs(),
        })
    }
}
