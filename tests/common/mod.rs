#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use camino::{Utf8Path, Utf8PathBuf};
use cid::Cid;
use libp2p::PeerId;
use parking_lot::Mutex;
use serde_json::Value;

use hive_light_client::{
    controlplane::{
        envelope::{self, Envelope, CMD_SEPARATOR},
        ExternalIpResolver,
    },
    session::state::{SessionState, StepObserver},
    transport::{
        Engine, FileStream, Ledger, LedgerEntry, Transport, TransportFactory, TransportSetup,
    },
    types::{Cookie, DownloadMetadata, LeaderPeer},
    ControlPlaneClient, SessionConfig, Tunables,
};

pub const CID_V0: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
pub const CID_V1: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

pub const SWARM_KEY: &str = "/key/swarm/psk/1.0.0/\n/base16/\n\
    e0b1c8a9f4d3e2c1b0a99887766554433221100ffeeddccbbaa9988776655443\n";

/// Control plane on a loopback port. Records every command it receives.
#[derive(Clone)]
pub struct FakeControlPlane {
    pub endpoint: String,
    metadata: Arc<Mutex<DownloadMetadata>>,
    fetch_rejection: Arc<Mutex<Option<(i64, String)>>>,
    complete_status: Arc<Mutex<i64>>,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeControlPlane {
    pub async fn start(metadata: DownloadMetadata) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let plane = Self {
            endpoint: format!("http://{addr}/v3/execute"),
            metadata: Arc::new(Mutex::new(metadata)),
            fetch_rejection: Arc::default(),
            complete_status: Arc::new(Mutex::new(envelope::STATUS_OK)),
            commands: Arc::default(),
        };
        let app = Router::new()
            .route("/v3/execute", post(execute))
            .with_state(plane.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        plane
    }

    pub fn client(&self) -> ControlPlaneClient {
        ControlPlaneClient::new(self.endpoint.clone())
            .with_ip_resolver(ExternalIpResolver::new(Vec::new()))
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }

    pub fn commands_named(&self, verb: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|tokens| tokens.get(2).map(String::as_str) == Some(verb))
            .collect()
    }

    pub fn reject_fetch(&self, status: i64, details: &str) {
        *self.fetch_rejection.lock() = Some((status, details.to_owned()));
    }

    pub fn reject_complete(&self, status: i64) {
        *self.complete_status.lock() = status;
    }
}

async fn execute(State(plane): State<FakeControlPlane>, Json(request): Json<Envelope>) -> Vec<u8> {
    let tokens: Vec<String> = request.val.split(CMD_SEPARATOR).map(str::to_owned).collect();
    plane.commands.lock().push(tokens.clone());
    let reply = match tokens.get(2).map(String::as_str) {
        Some("fetch") => {
            let rejection = plane.fetch_rejection.lock().clone();
            match rejection {
                Some((status, details)) => envelope::encode_reply(status, &details, &Value::Null),
                None => {
                    let metadata = plane.metadata.lock().clone();
                    envelope::encode_reply(envelope::STATUS_OK, "", &metadata)
                }
            }
        }
        Some("complete") => {
            let status = *plane.complete_status.lock();
            envelope::encode_reply(status, "", &Value::Null)
        }
        _ => envelope::encode_reply(400, "unknown command", &Value::Null),
    };
    reply.unwrap()
}

/// Engine that serves content from memory. Leaders connect when they are live.
pub struct MemoryEngine {
    live: Mutex<HashSet<PeerId>>,
    connected: Mutex<HashSet<PeerId>>,
    content: Mutex<HashMap<String, Vec<u8>>>,
    stalled: Mutex<HashSet<String>>,
    // Write halves of stalled streams, kept so their readers never see EOF.
    open_writers: Mutex<Vec<tokio::io::DuplexStream>>,
    ledger: Mutex<Option<Vec<LedgerEntry>>>,
    pub bootstrap_calls: AtomicUsize,
}

impl MemoryEngine {
    pub fn new(live: impl IntoIterator<Item = PeerId>) -> Arc<Self> {
        Arc::new(Self {
            live: Mutex::new(live.into_iter().collect()),
            connected: Mutex::default(),
            content: Mutex::default(),
            stalled: Mutex::default(),
            open_writers: Mutex::default(),
            ledger: Mutex::new(Some(Vec::new())),
            bootstrap_calls: AtomicUsize::new(0),
        })
    }

    pub fn serve(&self, cid: &str, bytes: Vec<u8>) {
        let key = Cid::try_from(cid).unwrap().to_string();
        self.content.lock().insert(key, bytes);
    }

    /// Serves `cid` as a stream that never yields a byte.
    pub fn serve_stalled(&self, cid: &str) {
        let key = Cid::try_from(cid).unwrap().to_string();
        self.stalled.lock().insert(key);
    }

    pub fn set_ledger(&self, entries: Vec<LedgerEntry>) {
        *self.ledger.lock() = Some(entries);
    }

    pub fn fail_ledger(&self) {
        *self.ledger.lock() = None;
    }
}

#[async_trait]
impl Transport for MemoryEngine {
    async fn bootstrap(&self, leaders: &[LeaderPeer]) -> usize {
        self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
        let live = self.live.lock().clone();
        let mut connected = self.connected.lock();
        leaders
            .iter()
            .filter(|l| live.contains(&l.id) && connected.insert(l.id))
            .count()
    }

    async fn fetch(&self, cid: &Cid) -> anyhow::Result<FileStream> {
        if self.stalled.lock().contains(&cid.to_string()) {
            let (reader, writer) = tokio::io::duplex(64);
            self.open_writers.lock().push(writer);
            return Ok(FileStream {
                size: 1024,
                reader: Box::new(reader),
            });
        }
        let bytes = self
            .content
            .lock()
            .get(&cid.to_string())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no provider for {cid}"))?;
        Ok(FileStream {
            size: bytes.len() as u64,
            reader: Box::new(std::io::Cursor::new(bytes)),
        })
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.connected.lock().iter().copied().collect()
    }
}

#[async_trait]
impl Ledger for MemoryEngine {
    async fn ledger_entries(&self) -> anyhow::Result<Vec<LedgerEntry>> {
        self.ledger
            .lock()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ledger unavailable"))
    }
}

pub struct MemoryFactory {
    engine: Arc<MemoryEngine>,
    pub created: AtomicUsize,
    pub last_setup: Mutex<Option<TransportSetup>>,
}

impl MemoryFactory {
    pub fn new(engine: Arc<MemoryEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            created: AtomicUsize::new(0),
            last_setup: Mutex::default(),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportFactory for MemoryFactory {
    async fn create(&self, setup: TransportSetup) -> anyhow::Result<Engine> {
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.last_setup.lock() = Some(setup);
        Ok(Engine {
            transport: self.engine.clone(),
            ledger: self.engine.clone(),
        })
    }
}

pub fn step_recorder() -> (Arc<Mutex<Vec<SessionState>>>, Arc<dyn StepObserver>) {
    let steps = Arc::new(Mutex::new(Vec::new()));
    let sink = steps.clone();
    let observer: Arc<dyn StepObserver> =
        Arc::new(move |state: SessionState| sink.lock().push(state));
    (steps, observer)
}

pub fn leaders(n: usize) -> Vec<LeaderPeer> {
    (0..n)
        .map(|i| LeaderPeer {
            id: PeerId::random(),
            addrs: vec![format!("/ip4/10.0.0.{}/tcp/4001", i + 1).parse().unwrap()],
        })
        .collect()
}

pub fn metadata(leaders: Vec<LeaderPeer>, hash: &str, filename: &str) -> DownloadMetadata {
    DownloadMetadata {
        cookie: Cookie {
            id: "cookie-1".to_owned(),
            leaders,
            download_index: "7".to_owned(),
            filename: filename.to_owned(),
            hash: hash.to_owned(),
            link: Some("https://hive.example/s/abc123".to_owned()),
        },
        swarm_key: SWARM_KEY.as_bytes().to_vec(),
        rate: "0.001".to_owned(),
    }
}

/// Deterministic, non-repeating-looking payload.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn temp_dir(tag: &str) -> Utf8PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    let id = NEXT.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "hive_light_client_{tag}_{}_{id}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    Utf8PathBuf::from_path_buf(dir).unwrap()
}

pub fn fast_tunables() -> Tunables {
    Tunables {
        peer_threshold: 5,
        retry_interval: Duration::from_millis(200),
        retry_budget: Duration::from_secs(10),
        peer_poll_interval: Duration::from_millis(20),
        progress_interval: Duration::from_millis(10),
        ledger_grace: Duration::from_millis(10),
        listen_addrs: vec!["/ip4/127.0.0.1/tcp/0".to_owned()],
    }
}

pub fn config(dir: &Utf8Path, timeout: Duration) -> SessionConfig {
    SessionConfig::new(dir, timeout).with_tunables(fast_tunables())
}
