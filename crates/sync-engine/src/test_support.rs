//! Fakes shared by the in-crate tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crypto_session::ClientIdentity;
use net_transport::{HttpSender, RelayRequest, RelayResponse, TransportResult};

use crate::{DirectoryRefresh, EngineError, EngineEvent, ErrorKind, Notifier};

/// One identity for every test; key generation is slow
pub fn test_identity() -> &'static ClientIdentity {
    static IDENTITY: OnceLock<ClientIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| ClientIdentity::generate().unwrap())
}

type Responder = Box<dyn Fn(&RelayRequest) -> TransportResult<RelayResponse> + Send + Sync>;

/// Records every request and answers through a closure. With a gate, each
/// call waits for a permit before answering.
pub struct MockSender {
    requests: Mutex<Vec<RelayRequest>>,
    responder: Responder,
    gate: Option<Semaphore>,
    current: AtomicUsize,
    max_seen: AtomicUsize,
}

impl MockSender {
    pub fn new(
        responder: impl Fn(&RelayRequest) -> TransportResult<RelayResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            gate: None,
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        }
    }

    /// Answers every request with the given status and an empty body
    pub fn status(status: u16) -> Self {
        Self::new(move |_| Ok(RelayResponse::new(status, "")))
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn requests(&self) -> Vec<RelayRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn max_seen(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpSender for MockSender {
    async fn send(&self, request: RelayRequest) -> TransportResult<RelayResponse> {
        self.requests.lock().push(request.clone());
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        self.current.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(&request)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    errors: Mutex<Vec<(ErrorKind, String)>>,
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<(ErrorKind, String)> {
        self.errors.lock().clone()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, error: &EngineError) {
        self.errors.lock().push((error.kind(), error.to_string()));
    }

    fn event(&self, event: &EngineEvent) {
        self.events.lock().push(event.clone());
    }
}

#[derive(Default)]
pub struct RecordingRefresher {
    dirs: Mutex<Vec<String>>,
}

impl RecordingRefresher {
    pub fn dirs(&self) -> Vec<String> {
        self.dirs.lock().clone()
    }
}

impl DirectoryRefresh for RecordingRefresher {
    fn refresh(&self, dir: &str) {
        self.dirs.lock().push(dir.to_string());
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn notifier() -> Arc<RecordingNotifier> {
    Arc::new(RecordingNotifier::default())
}
