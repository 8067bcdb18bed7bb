//! Engine facade and response routing

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crypto_session::ClientIdentity;
use net_transport::{HttpSender, ReqwestSender};
use shared_protocol::{Command, command_name};

use crate::dispatcher::Inbound;
use crate::{
    DirectoryRefresh, Dispatcher, EngineConfig, EngineEvent, EngineResult, HandshakeCoordinator,
    HandshakeState, LogRefresher, Notifier, SessionHandle, SessionSnapshot, TracingNotifier,
    UploadManager,
};

/// Client side of the relay: one session, its handshake, its dispatcher
/// and its uploads.
pub struct SyncEngine {
    config: EngineConfig,
    session: SessionHandle,
    dispatcher: Dispatcher,
    handshake: Arc<HandshakeCoordinator>,
    uploads: Arc<UploadManager>,
    router: JoinHandle<()>,
}

impl SyncEngine {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: EngineConfig,
        sender: Arc<dyn HttpSender>,
        notifier: Arc<dyn Notifier>,
        refresher: Arc<dyn DirectoryRefresh>,
    ) -> Self {
        let session = SessionHandle::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher::new(
            sender,
            session.clone(),
            notifier.clone(),
            inbound_tx,
            config.max_in_flight,
        );
        let handshake = Arc::new(HandshakeCoordinator::new(
            session.clone(),
            dispatcher.clone(),
            notifier.clone(),
            &config.client_settings(Vec::new()),
            config.pin,
        ));
        let uploads = Arc::new(UploadManager::new(
            dispatcher.clone(),
            notifier.clone(),
            refresher,
            config.upload_chunk_len,
        ));

        let router = Router {
            handshake: handshake.clone(),
            uploads: uploads.clone(),
            notifier,
            bootstrap_uploads: config.bootstrap_uploads.clone(),
        };
        let router = tokio::spawn(router.run(inbound_rx));

        Self {
            config,
            session,
            dispatcher,
            handshake,
            uploads,
            router,
        }
    }

    /// Engine talking to the configured relay, reporting through tracing
    pub fn connect(config: EngineConfig) -> EngineResult<Self> {
        let sender = ReqwestSender::new(&config.proxy_url, config.request_timeout())?;
        info!("Relay endpoint {}", sender.data_url());
        Ok(Self::new(
            config,
            Arc::new(sender),
            Arc::new(TracingNotifier),
            Arc::new(LogRefresher),
        ))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pair from a scanned QR code, replacing any previous session
    pub async fn scan_qr(&self, qr_text: &str) -> EngineResult<()> {
        self.uploads.abandon_all();
        self.handshake.scan_qr(qr_text).await
    }

    /// Pair with an identity generated beforehand
    pub fn scan_qr_with_identity(&self, qr_text: &str, identity: ClientIdentity) -> EngineResult<()> {
        self.uploads.abandon_all();
        self.handshake.scan_qr_with_identity(qr_text, identity)
    }

    /// Queue any command for the remote device
    pub fn enqueue(&self, command: Command, payload: Vec<u8>) {
        self.dispatcher.enqueue(command.id(), payload);
    }

    pub fn poll_notifications(&self) {
        self.dispatcher
            .enqueue(Command::GetPushNotifications.id(), Vec::new());
    }

    /// Upload a local file, named on the device by `remote_name` or else
    /// by its file name
    pub async fn upload_file(&self, path: &Path, remote_name: Option<&str>) -> EngineResult<u32> {
        self.uploads.start_file(path, remote_name).await
    }

    pub fn upload_bytes(&self, full_name: impl Into<String>, data: impl Into<Bytes>) -> EngineResult<u32> {
        self.uploads.upload_bytes(full_name.into(), data)
    }

    pub fn uploads(&self) -> &UploadManager {
        &self.uploads
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.router.abort();
    }
}

/// Hands decoded responses to the component that owns them
struct Router {
    handshake: Arc<HandshakeCoordinator>,
    uploads: Arc<UploadManager>,
    notifier: Arc<dyn Notifier>,
    bootstrap_uploads: Vec<PathBuf>,
}

impl Router {
    async fn run(self, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
        while let Some(message) = inbound.recv().await {
            self.route(message);
        }
        debug!("Response router stopped");
    }

    fn route(&self, message: Inbound) {
        match message {
            Inbound::KeyExchange { generation, plain } => {
                if let Err(e) = self.handshake.on_key_exchange(generation, &plain) {
                    self.handshake.fail(&e);
                }
            }
            Inbound::Authenticated { generation } => {
                if self.handshake.on_authenticated(generation) {
                    self.start_bootstrap_uploads();
                }
            }
            Inbound::Command {
                generation,
                command_id,
                params,
            } => match Command::from_id(command_id) {
                Some(Command::Pair) => {
                    if let Err(e) = self.handshake.on_pair(generation, params) {
                        self.handshake.fail(&e);
                    }
                }
                Some(Command::SetFile) => {
                    if let Err(e) = self.uploads.on_ack(&params) {
                        self.notifier.error(&e);
                    }
                }
                Some(Command::Error) => {
                    let message = params
                        .first()
                        .map(|p| String::from_utf8_lossy(p).into_owned())
                        .unwrap_or_default();
                    self.notifier.event(&EngineEvent::RemoteError(message));
                }
                _ => debug!(
                    "No handler for {} ({} params)",
                    command_name(command_id),
                    params.len()
                ),
            },
        }
    }

    fn start_bootstrap_uploads(&self) {
        if self.bootstrap_uploads.is_empty() {
            return;
        }
        let uploads = self.uploads.clone();
        let notifier = self.notifier.clone();
        let paths = self.bootstrap_uploads.clone();
        tokio::spawn(async move {
            for path in paths {
                if let Err(e) = uploads.start_file(&path, None).await {
                    notifier.error(&e);
                }
            }
        });
    }
}
