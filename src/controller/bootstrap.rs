use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::controller::deadline::Deadline;
use crate::session::{config::Tunables, result::SessionError};
use crate::transport::Transport;
use crate::types::LeaderPeer;

/// Source of fresher leader lists while lagged bootstrapping is running.
#[async_trait]
pub trait LeaderRefresh: Send + Sync {
    async fn refresh_leaders(&self) -> anyhow::Result<Vec<LeaderPeer>>;
}

/// Connected-peer count shared by the main flow and the retry task.
/// Only ever grows during a session.
#[derive(Debug, Clone, Default)]
pub struct PeerCounter(Arc<AtomicUsize>);

impl PeerCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn add(&self, n: usize) -> usize {
        self.0.fetch_add(n, Ordering::SeqCst) + n
    }
}

pub struct BootstrapStart {
    pub connected: usize,
    /// Present when the initial round fell short of the threshold.
    pub retry: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Bootstrapper {
    transport: Arc<dyn Transport>,
    known: Arc<Mutex<Vec<LeaderPeer>>>,
    counter: PeerCounter,
    // Bootstrap calls from the main flow and the retry task never overlap,
    // so a peer can't be counted twice.
    gate: Arc<tokio::sync::Mutex<()>>,
    threshold: usize,
    retry_interval: Duration,
    retry_budget: Duration,
    poll_interval: Duration,
}

impl Bootstrapper {
    pub fn new(
        transport: Arc<dyn Transport>,
        leaders: Vec<LeaderPeer>,
        tunables: &Tunables,
    ) -> Self {
        Self {
            transport,
            known: Arc::new(Mutex::new(leaders)),
            counter: PeerCounter::default(),
            gate: Arc::new(tokio::sync::Mutex::new(())),
            threshold: tunables.peer_threshold,
            retry_interval: tunables.retry_interval,
            retry_budget: tunables.retry_budget,
            poll_interval: tunables.peer_poll_interval,
        }
    }

    pub fn connected(&self) -> usize {
        self.counter.get()
    }

    pub fn known_leaders(&self) -> usize {
        self.known.lock().len()
    }

    /// Runs the synchronous bootstrap round and, if it came up short, spawns
    /// the retry task. The task stops on its own or when the session token fires.
    pub async fn start(
        &self,
        refresh: Option<Arc<dyn LeaderRefresh>>,
        deadline: &Deadline,
    ) -> Result<BootstrapStart, SessionError> {
        let connected = deadline.guard(self.bootstrap_known()).await?;
        tracing::info!(
            connected,
            leaders = self.known_leaders(),
            threshold = self.threshold,
            "initial bootstrap done"
        );
        let retry = (connected < self.threshold).then(|| {
            tokio::spawn(self.clone().retry_loop(
                refresh,
                deadline.token().clone(),
                deadline.started_at(),
            ))
        });
        Ok(BootstrapStart { connected, retry })
    }

    /// Blocks until at least one peer is connected. Deadline expiry while
    /// waiting means the swarm never answered.
    pub async fn await_peers(&self, deadline: &Deadline) -> Result<usize, SessionError> {
        tracing::warn!("No nodes connected. Waiting to find more");
        loop {
            let connected = self.counter.get();
            if connected > 0 {
                return Ok(connected);
            }
            tokio::select! {
                _ = deadline.token().cancelled() => {
                    tracing::info!("Client stopped while waiting for more peers");
                    return Err(match deadline.interruption() {
                        SessionError::SessionTimeout => SessionError::NoPeersAvailable,
                        other => other,
                    });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn bootstrap_known(&self) -> usize {
        let _gate = self.gate.lock().await;
        let leaders = self.known.lock().clone();
        let added = self.transport.bootstrap(&leaders).await;
        let total = self.counter.add(added);
        tracing::debug!(added, total, "bootstrap round");
        total
    }

    fn merge_leaders(&self, fresh: Vec<LeaderPeer>) -> usize {
        let mut known = self.known.lock();
        let mut seen: HashSet<_> = known.iter().map(|l| l.id).collect();
        let before = known.len();
        known.extend(fresh.into_iter().filter(|l| seen.insert(l.id)));
        known.len() - before
    }

    async fn retry_loop(
        self,
        refresh: Option<Arc<dyn LeaderRefresh>>,
        cancel: CancellationToken,
        session_start: Instant,
    ) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.retry_interval, self.retry_interval);
        while self.counter.get() < self.threshold {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("lagged bootstrapping stopped with the session");
                    return;
                }
                _ = ticker.tick() => {}
            }
            if session_start.elapsed() > self.retry_budget {
                tracing::warn!(
                    budget = ?self.retry_budget,
                    "Tried getting more peers for the whole budget, giving up"
                );
                return;
            }

            if let Some(refresh) = &refresh {
                let fresh = tokio::select! {
                    _ = cancel.cancelled() => return,
                    fresh = refresh.refresh_leaders() => fresh,
                };
                match fresh {
                    Ok(fresh) => {
                        let added = self.merge_leaders(fresh);
                        if added > 0 {
                            tracing::info!(added, "Got new leaders");
                        }
                    }
                    Err(err) => tracing::debug!(error = %err, "leader refresh failed"),
                }
            }

            if self.counter.get() < self.known_leaders() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    total = self.bootstrap_known() => {
                        tracing::info!(connected = total, "lagged bootstrap round");
                    }
                }
            }
        }
        tracing::info!(connected = self.counter.get(), "Done lagged bootstrapping");
    }
}
