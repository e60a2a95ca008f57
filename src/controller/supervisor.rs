use std::{io, sync::atomic::Ordering, sync::Arc};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cid::Cid;
use libp2p::{identity::PublicKey, PeerId};
use tokio::{io::AsyncWriteExt, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::controller::{
    bootstrap::{Bootstrapper, LeaderRefresh},
    deadline::Deadline,
    finalize::Finalizer,
    progress::{ProgressMonitor, ProgressObserver},
};
use crate::controlplane::ControlPlaneClient;
use crate::session::{
    config::SessionConfig,
    result::{SessionError, SessionResult},
    state::{AtomicSessionState, SessionState, StepObserver},
};
use crate::transport::{TransportFactory, TransportSetup};
use crate::types::LeaderPeer;

/// Drives one download from sharable token to result.
///
/// A client runs one session at a time; [`LightClient::state`] reflects the
/// session currently in flight, or the outcome of the last one.
pub struct LightClient {
    config: SessionConfig,
    control: Arc<ControlPlaneClient>,
    factory: Arc<dyn TransportFactory>,
    state: AtomicSessionState,
    steps: Option<Arc<dyn StepObserver>>,
}

impl LightClient {
    pub fn new(
        config: SessionConfig,
        control: ControlPlaneClient,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            config,
            control: Arc::new(control),
            factory,
            state: AtomicSessionState::new(SessionState::Idle),
            steps: None,
        }
    }

    /// Reports every state the session enters, terminal ones included.
    pub fn with_step_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.steps = Some(observer);
        self
    }

    pub fn peer_id(&self) -> PeerId {
        self.config.identity.public().to_peer_id()
    }

    pub fn state(&self) -> SessionState {
        self.state.load(Ordering::SeqCst)
    }

    pub async fn run(
        &self,
        sharable: &str,
        info_only: bool,
        want_stats: bool,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> SessionResult {
        self.run_until(&CancellationToken::new(), sharable, info_only, want_stats, observer)
            .await
    }

    /// Like [`run`](Self::run), but also stops when `parent` is cancelled.
    pub async fn run_until(
        &self,
        parent: &CancellationToken,
        sharable: &str,
        info_only: bool,
        want_stats: bool,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> SessionResult {
        let deadline = Deadline::start(self.config.timeout, parent);
        let mut tasks = Vec::new();
        let outcome = {
            let _stop_background = scopeguard::guard(deadline.token().clone(), |token| {
                token.cancel();
            });
            self.drive(sharable, info_only, want_stats, observer, &deadline, &mut tasks)
                .await
        };
        deadline.release().await;
        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "background task ended abnormally");
            }
        }

        match outcome {
            Ok(result) => {
                self.enter(match &result {
                    SessionResult::MetadataOnly(_) => SessionState::MetadataReported,
                    SessionResult::StatSnapshot(_) => SessionState::StatReported,
                    _ => SessionState::Succeeded,
                });
                result
            }
            Err(err) => {
                tracing::error!(error = %err, kind = ?err.kind(), "{}", err.message());
                self.enter(SessionState::Failed);
                err.into()
            }
        }
    }

    fn enter(&self, state: SessionState) {
        tracing::debug!(%state, "session state");
        self.state.store(state, Ordering::SeqCst);
        if let Some(steps) = &self.steps {
            steps.enter_state(state);
        }
    }

    async fn drive(
        &self,
        sharable: &str,
        info_only: bool,
        want_stats: bool,
        observer: Option<Arc<dyn ProgressObserver>>,
        deadline: &Deadline,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<SessionResult, SessionError> {
        self.enter(SessionState::FetchingMetadata);
        let public_key = self.config.identity.public();
        let metadata = deadline
            .guard(self.control.fetch_metadata(sharable, None, &public_key))
            .await??;
        tracing::info!(
            cookie = metadata.cookie_id(),
            filename = metadata.filename(),
            leaders = metadata.leaders().len(),
            "Got download metadata"
        );
        if info_only {
            return Ok(SessionResult::MetadataOnly(metadata));
        }

        self.enter(SessionState::CreatingDestination);
        let path = destination_path(&self.config.destination, metadata.filename())?;
        let mut file = deadline
            .guard(tokio::fs::File::create(&path))
            .await?
            .map_err(|source| SessionError::Destination {
                path: path.clone(),
                source,
            })?;

        self.enter(SessionState::SettingUpTransport);
        let setup = TransportSetup::from_metadata(
            &metadata,
            &self.config.identity,
            &self.config.tunables.listen_addrs,
        )
        .map_err(|err| SessionError::TransportSetup(err.into()))?;
        let engine = deadline
            .guard(self.factory.create(setup))
            .await?
            .map_err(SessionError::TransportSetup)?;
        tracing::info!(peer_id = %self.peer_id(), "p2p peer ready");

        self.enter(SessionState::Bootstrapping);
        let bootstrapper = Bootstrapper::new(
            engine.transport.clone(),
            metadata.leaders().to_vec(),
            &self.config.tunables,
        );
        let refresh: Arc<dyn LeaderRefresh> = Arc::new(MetadataRefresh {
            control: self.control.clone(),
            sharable: sharable.to_owned(),
            cookie_id: metadata.cookie_id().to_owned(),
            public_key,
        });
        let start = bootstrapper.start(Some(refresh), deadline).await?;
        tasks.extend(start.retry);
        if start.connected == 0 {
            self.enter(SessionState::AwaitingPeers);
            bootstrapper.await_peers(deadline).await?;
        }

        let hash = metadata.content_hash();
        let cid = Cid::try_from(hash).map_err(|err| SessionError::InvalidContentHash {
            hash: hash.to_owned(),
            reason: err.to_string(),
        })?;

        self.enter(SessionState::Downloading);
        let stream = deadline
            .guard(engine.transport.fetch(&cid))
            .await?
            .map_err(|err| SessionError::Transfer(err.context("Failed fetching content")))?;
        tracing::info!(
            %cid,
            size = stream.size,
            connected = bootstrapper.connected(),
            "Starting download"
        );

        let stop_progress = deadline.token().child_token();
        if let Some(observer) = observer {
            let monitor = ProgressMonitor::new(
                path.clone(),
                stream.size,
                self.config.tunables.progress_interval,
                observer,
            );
            tasks.push(monitor.spawn(stop_progress.clone()));
        }

        let started = Instant::now();
        let mut reader = stream.reader;
        let copied = deadline
            .guard(async {
                let bytes = tokio::io::copy(&mut reader, &mut file).await?;
                file.flush().await?;
                Ok::<_, io::Error>(bytes)
            })
            .await;
        let elapsed = started.elapsed();
        stop_progress.cancel();
        let bytes = copied?.map_err(|err| {
            SessionError::Transfer(anyhow::Error::new(err).context("Failed writing to destination"))
        })?;
        drop(file);
        if bytes != stream.size {
            tracing::warn!(bytes, declared = stream.size, "copied size differs from declared size");
        }
        tracing::info!(bytes, ?elapsed, %path, "Download finished");

        self.enter(SessionState::Finalizing);
        let finalizer = Finalizer {
            control: &self.control,
            engine: &engine,
            ledger_grace: self.config.tunables.ledger_grace,
        };
        Ok(finalizer
            .finalize(metadata.cookie_id(), elapsed, want_stats, deadline)
            .await)
    }
}

/// Re-fetches metadata for the running download to learn about new leaders.
struct MetadataRefresh {
    control: Arc<ControlPlaneClient>,
    sharable: String,
    cookie_id: String,
    public_key: PublicKey,
}

#[async_trait]
impl LeaderRefresh for MetadataRefresh {
    async fn refresh_leaders(&self) -> anyhow::Result<Vec<LeaderPeer>> {
        let metadata = self
            .control
            .fetch_metadata(&self.sharable, Some(&self.cookie_id), &self.public_key)
            .await?;
        Ok(metadata.cookie.leaders)
    }
}

/// Only the last component of the advertised filename is used, so metadata
/// can't point outside the destination directory.
fn destination_path(dir: &Utf8Path, filename: &str) -> Result<Utf8PathBuf, SessionError> {
    match Utf8Path::new(filename).file_name() {
        Some(name) => Ok(dir.join(name)),
        None => Err(SessionError::Destination {
            path: dir.join(filename),
            source: io::Error::new(io::ErrorKind::InvalidInput, "no usable filename in metadata"),
        }),
    }
}
