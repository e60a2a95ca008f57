use std::{future::Future, time::Duration};

use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::session::result::SessionError;

/// The single cancellation signal of a session.
///
/// Fires when the overall timeout elapses or when the caller's parent token is
/// cancelled, whichever comes first.
pub struct Deadline {
    token: CancellationToken,
    started_at: Instant,
    expires_at: Instant,
    timer: JoinHandle<()>,
}

impl Deadline {
    pub fn start(timeout: Duration, parent: &CancellationToken) -> Self {
        let token = parent.child_token();
        let started_at = Instant::now();
        let expires_at = started_at + timeout;
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep_until(expires_at) => {
                        tracing::info!(?timeout, "session deadline reached");
                        token.cancel();
                    }
                }
            }
        });
        Self {
            token,
            started_at,
            expires_at,
            timer,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// The error a step reports when the signal interrupted it.
    pub fn interruption(&self) -> SessionError {
        if self.expired() {
            SessionError::SessionTimeout
        } else {
            SessionError::SessionCancelled
        }
    }

    /// Runs `fut` unless the session signal fires first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, SessionError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(self.interruption()),
            output = fut => Ok(output),
        }
    }

    /// Fires the signal for everyone still listening and waits for the timer.
    pub async fn release(self) {
        self.token.cancel();
        let _ = self.timer.await;
    }
}
