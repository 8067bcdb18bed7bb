//! Request dispatcher
//!
//! Outbound commands go onto a spooler and are released newest first while
//! fewer than `max_in_flight` requests are out. Queue mutation and the
//! in-flight count share one lock, so admission can neither overshoot the
//! ceiling nor miss a wake-up. Responses are decoded on the blocking pool
//! and handed to the engine over a channel.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crypto_session::{SessionCipher, xor_ab};
use net_transport::{HttpSender, RelayRequest, TransportError};
use shared_protocol::{Command, ProtocolError, ResponseFrame, command_name, encode_command};

use crate::{EngineResult, Notifier, ResourceError, SessionHandle, StateError};

/// Decoded response, tagged with the session generation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// XOR-decrypted reply to `GetEncryptedQR`
    KeyExchange { generation: u64, plain: Vec<u8> },
    Authenticated { generation: u64 },
    Command {
        generation: u64,
        command_id: i32,
        params: Vec<Vec<u8>>,
    },
}

#[derive(Debug)]
struct Outbound {
    command_id: i32,
    payload: Vec<u8>,
    generation: u64,
}

#[derive(Debug, Default)]
struct Spooler {
    pending: Vec<Outbound>,
    in_flight: usize,
}

struct Inner {
    spooler: Mutex<Spooler>,
    sender: Arc<dyn HttpSender>,
    session: SessionHandle,
    notifier: Arc<dyn Notifier>,
    inbound: mpsc::UnboundedSender<Inbound>,
    max_in_flight: usize,
    runtime: Handle,
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Must be called from within a Tokio runtime; requests run on it.
    pub(crate) fn new(
        sender: Arc<dyn HttpSender>,
        session: SessionHandle,
        notifier: Arc<dyn Notifier>,
        inbound: mpsc::UnboundedSender<Inbound>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                spooler: Mutex::new(Spooler::default()),
                sender,
                session,
                notifier,
                inbound,
                max_in_flight: max_in_flight.max(1),
                runtime: Handle::current(),
            }),
        }
    }

    /// Queue a command for the current session. Never blocks; failures go
    /// to the notifier.
    pub fn enqueue(&self, command_id: i32, payload: Vec<u8>) {
        let generation = self.inner.session.generation();
        debug!(
            "Queue {} ({} bytes, generation {})",
            command_name(command_id),
            payload.len(),
            generation
        );

        let mut spooler = self.inner.spooler.lock();
        spooler.pending.push(Outbound {
            command_id,
            payload,
            generation,
        });
        self.release_ready(&mut spooler);
    }

    /// Drop every queued request that has not been sent yet
    pub fn drain_pending(&self) -> usize {
        let drained = std::mem::take(&mut self.inner.spooler.lock().pending).len();
        if drained > 0 {
            debug!("Drained {} queued requests", drained);
        }
        drained
    }

    pub fn in_flight(&self) -> usize {
        self.inner.spooler.lock().in_flight
    }

    pub fn pending(&self) -> usize {
        self.inner.spooler.lock().pending.len()
    }

    fn release_ready(&self, spooler: &mut Spooler) {
        while spooler.in_flight < self.inner.max_in_flight {
            let Some(request) = spooler.pending.pop() else {
                break;
            };
            spooler.in_flight += 1;
            let this = self.clone();
            self.inner.runtime.spawn(async move { this.execute(request).await });
        }
    }

    fn finish(&self) {
        let mut spooler = self.inner.spooler.lock();
        spooler.in_flight = spooler.in_flight.saturating_sub(1);
        self.release_ready(&mut spooler);
    }

    async fn execute(self, request: Outbound) {
        let result = self.round_trip(&request).await;
        self.finish();

        match result {
            Ok(Some(body)) => {
                let this = self.clone();
                let generation = request.generation;
                self.inner
                    .runtime
                    .spawn_blocking(move || this.deliver(generation, &body));
            }
            Ok(None) => {}
            Err(e) => {
                error!("{} failed: {}", command_name(request.command_id), e);
                self.inner.notifier.error(&e);
            }
        }
    }

    /// Send one request. `Ok(None)` means it belonged to a discarded
    /// session and was dropped unsent.
    async fn round_trip(&self, request: &Outbound) -> EngineResult<Option<String>> {
        let Some(relay_request) = self.build_request(request)? else {
            return Ok(None);
        };

        let response = self.inner.sender.send(relay_request).await?;
        match response.status {
            200 => Ok(Some(response.body)),
            404 => Err(ProtocolError::UnknownRemote.into()),
            421 => Err(ProtocolError::RemoteNotLoggedIn.into()),
            503 => Err(ResourceError::ConcurrencyLimitReached.into()),
            status => Err(TransportError::Status(status).into()),
        }
    }

    fn build_request(&self, request: &Outbound) -> EngineResult<Option<RelayRequest>> {
        let command = Command::from_id(request.command_id);
        let (query, cipher) = {
            let session = self.inner.session.lock();
            if session.generation() != request.generation {
                debug!(
                    "Dropping {} from discarded session generation {}",
                    command_name(request.command_id),
                    request.generation
                );
                return Ok(None);
            }

            let mut query = vec![(
                "cid".to_string(),
                session.client_id().unwrap_or_default().to_string(),
            )];
            if let Some(command) = command.filter(|c| c.is_bootstrap()) {
                query.push((
                    "sid".to_string(),
                    session.server_id().unwrap_or_default().to_string(),
                ));
                query.push(("purpose".to_string(), command.name().to_string()));
            }
            (query, session.cipher().clone())
        };

        let relay_request = match command {
            Some(command) if command.is_poll() => RelayRequest::get(query),
            Some(command) if command.is_bootstrap() => {
                RelayRequest::post(query, request.payload.clone())
            }
            _ => {
                if !cipher.is_symmetric() {
                    return Err(StateError::Unregistered.into());
                }
                let frame = encode_command(request.command_id, &request.payload);
                RelayRequest::post(query, cipher.encrypt(&frame)?)
            }
        };
        Ok(Some(relay_request))
    }

    fn deliver(&self, generation: u64, body: &str) {
        match self.decode(generation, body) {
            Ok(Some(inbound)) => {
                if self.inner.inbound.send(inbound).is_err() {
                    debug!("Engine stopped, response discarded");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to decode response: {}", e);
                self.inner.notifier.error(&e);
            }
        }
    }

    /// Base64-decode and decrypt a 200 body. The decryption path follows
    /// pairing state: QR key, then negotiated cipher, then our RSA key.
    fn decode(&self, generation: u64, body: &str) -> EngineResult<Option<Inbound>> {
        let raw = BASE64.decode(body.trim()).map_err(ProtocolError::from)?;
        if raw.is_empty() {
            return Err(ProtocolError::EmptyResponse.into());
        }

        let (qr_key, cipher, identity) = {
            let mut session = self.inner.session.lock();
            if session.generation() != generation {
                debug!("Orphaned response for generation {} dropped", generation);
                return Ok(None);
            }
            match session.take_qr_key() {
                Some(qr_key) => (Some(qr_key), SessionCipher::None, None),
                None => (None, session.cipher().clone(), session.identity().cloned()),
            }
        };

        if let Some(qr_key) = qr_key {
            let plain = xor_ab(&qr_key, &raw);
            return Ok(Some(Inbound::KeyExchange { generation, plain }));
        }

        let plain = match (&cipher, identity) {
            (SessionCipher::None, Some(identity)) => identity.decrypt(&raw)?,
            (SessionCipher::None, None) => return Err(StateError::NoSession.into()),
            (cipher, _) => cipher.decrypt(&raw)?,
        };

        let frame = ResponseFrame::decode(&plain)?;
        debug!(
            "Response {} with {} bytes",
            command_name(frame.command_id),
            frame.body.len()
        );
        if frame.command_id == Command::Authentication.id() {
            return Ok(Some(Inbound::Authenticated { generation }));
        }

        Ok(Some(Inbound::Command {
            generation,
            command_id: frame.command_id,
            params: frame.params()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crypto_session::AesCbc;
    use net_transport::{RelayMethod, RelayResponse};
    use shared_protocol::{QR_KEY_LEN, join_params};

    use super::*;
    use crate::ErrorKind;
    use crate::test_support::{MockSender, RecordingNotifier, notifier, test_identity, wait_until};

    struct Fixture {
        dispatcher: Dispatcher,
        sender: Arc<MockSender>,
        notifier: Arc<RecordingNotifier>,
        session: SessionHandle,
        inbound: mpsc::UnboundedReceiver<Inbound>,
    }

    fn fixture(sender: MockSender, max_in_flight: usize) -> Fixture {
        let sender = Arc::new(sender);
        let notifier = notifier();
        let session = SessionHandle::new();
        session.lock().reset(test_identity().clone());
        let (tx, inbound) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            sender.clone(),
            session.clone(),
            notifier.clone(),
            tx,
            max_in_flight,
        );
        Fixture {
            dispatcher,
            sender,
            notifier,
            session,
            inbound,
        }
    }

    fn aes() -> AesCbc {
        AesCbc::new(&[0x11; 32], &[0x22; 16]).unwrap()
    }

    #[tokio::test]
    async fn test_never_more_than_five_in_flight() {
        let f = fixture(MockSender::status(404).gated(), 5);

        for _ in 0..12 {
            f.dispatcher.enqueue(Command::GetPushNotifications.id(), Vec::new());
        }
        wait_until(|| f.sender.current() == 5).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(f.sender.request_count(), 5);
        assert_eq!(f.dispatcher.in_flight(), 5);
        assert_eq!(f.dispatcher.pending(), 7);

        f.sender.release(12);
        wait_until(|| f.sender.request_count() == 12 && f.dispatcher.in_flight() == 0).await;
        assert!(f.sender.max_seen() <= 5);
        assert_eq!(f.dispatcher.pending(), 0);
        assert_eq!(f.notifier.errors().len(), 12);
    }

    #[tokio::test]
    async fn test_newest_request_goes_first() {
        let f = fixture(MockSender::status(404).gated(), 1);

        for marker in 1u8..=4 {
            f.dispatcher.enqueue(Command::GetEncryptedQR.id(), vec![marker]);
        }
        wait_until(|| f.sender.current() == 1).await;
        f.sender.release(4);
        wait_until(|| f.sender.request_count() == 4).await;

        let order: Vec<u8> = f.sender.requests().iter().map(|r| r.body[0]).collect();
        assert_eq!(order, vec![1, 4, 3, 2]);
    }

    #[tokio::test]
    async fn test_unregistered_fails_without_network() {
        let f = fixture(MockSender::status(200), 5);

        f.dispatcher.enqueue(Command::GetDir.id(), b"/".to_vec());
        wait_until(|| !f.notifier.errors().is_empty()).await;

        assert_eq!(f.sender.request_count(), 0);
        assert_eq!(f.notifier.errors()[0].0, ErrorKind::State);
        wait_until(|| f.dispatcher.in_flight() == 0).await;
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (404, ErrorKind::Protocol, "Cloud not found"),
            (421, ErrorKind::Protocol, "not logged"),
            (503, ErrorKind::Resource, "concurrent limit"),
            (500, ErrorKind::Transport, "500"),
        ];
        for (status, kind, text) in cases {
            let f = fixture(MockSender::status(status), 5);
            f.dispatcher.enqueue(Command::GetPushNotifications.id(), Vec::new());
            wait_until(|| !f.notifier.errors().is_empty()).await;

            let (actual_kind, message) = f.notifier.errors().remove(0);
            assert_eq!(actual_kind, kind, "status {status}");
            assert!(message.contains(text), "status {status}: {message}");
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_notified() {
        let f = fixture(MockSender::new(|_| Err(TransportError::Timeout)), 5);
        f.dispatcher.enqueue(Command::GetPushNotifications.id(), Vec::new());
        wait_until(|| !f.notifier.errors().is_empty()).await;

        assert_eq!(f.notifier.errors()[0].0, ErrorKind::Transport);
        wait_until(|| f.dispatcher.in_flight() == 0).await;
    }

    #[tokio::test]
    async fn test_query_parameters() {
        let f = fixture(MockSender::status(404), 5);
        f.session
            .lock()
            .begin_key_exchange([0; QR_KEY_LEN], "0102030405060708".into(), "relay".into());

        f.dispatcher.enqueue(Command::GetEncryptedQR.id(), Vec::new());
        wait_until(|| f.sender.request_count() == 1).await;
        f.dispatcher.enqueue(Command::GetPushNotifications.id(), Vec::new());
        wait_until(|| f.sender.request_count() == 2).await;

        let requests = f.sender.requests();
        let qr = &requests[0];
        assert_eq!(qr.method, RelayMethod::Post);
        assert_eq!(qr.query_param("cid"), Some(test_identity().client_id()));
        assert_eq!(qr.query_param("sid"), Some("0102030405060708"));
        assert_eq!(qr.query_param("purpose"), Some("GetEncryptedQR"));

        let poll = &requests[1];
        assert_eq!(poll.method, RelayMethod::Get);
        assert_eq!(poll.query_param("cid"), Some(test_identity().client_id()));
        assert_eq!(poll.query_param("purpose"), None);
    }

    #[tokio::test]
    async fn test_symmetric_commands_are_framed_and_encrypted() {
        let reply = BASE64.encode(
            aes()
                .encrypt(&encode_command(
                    Command::SetFile.id(),
                    &join_params(&[&b"docs/a.txt\t1"[..]]),
                ))
                .unwrap(),
        );
        let mut f = fixture(
            MockSender::new(move |_| Ok(RelayResponse::new(200, reply.clone()))),
            5,
        );
        f.session.lock().set_cipher(SessionCipher::Aes(aes()));
        let generation = f.session.generation();

        f.dispatcher.enqueue(Command::GetDir.id(), b"docs".to_vec());
        let inbound = f.inbound.recv().await.unwrap();

        let sent = f.sender.requests().remove(0);
        let frame = ResponseFrame::decode(&aes().decrypt(&sent.body).unwrap()).unwrap();
        assert_eq!(frame.command_id, Command::GetDir.id());
        assert_eq!(frame.body, b"docs");
        assert_eq!(sent.query_param("purpose"), None);

        assert_eq!(
            inbound,
            Inbound::Command {
                generation,
                command_id: Command::SetFile.id(),
                params: vec![b"docs/a.txt\t1".to_vec()],
            }
        );
    }

    #[tokio::test]
    async fn test_qr_key_reply_is_xor_decrypted_once() {
        let qr_key = [5u8; QR_KEY_LEN];
        let reply = BASE64.encode(xor_ab(&qr_key, b"remote public key"));
        let mut f = fixture(
            MockSender::new(move |_| Ok(RelayResponse::new(200, reply.clone()))),
            5,
        );
        f.session
            .lock()
            .begin_key_exchange(qr_key, "ab".into(), "relay".into());

        f.dispatcher.enqueue(Command::GetEncryptedQR.id(), Vec::new());
        match f.inbound.recv().await.unwrap() {
            Inbound::KeyExchange { plain, .. } => assert_eq!(plain, b"remote public key"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!f.session.lock().has_qr_key());
    }

    #[tokio::test]
    async fn test_authentication_reply() {
        let reply = BASE64.encode(
            aes()
                .encrypt(&encode_command(Command::Authentication.id(), &[]))
                .unwrap(),
        );
        let mut f = fixture(
            MockSender::new(move |_| Ok(RelayResponse::new(200, reply.clone()))),
            5,
        );
        f.session.lock().set_cipher(SessionCipher::Aes(aes()));
        let generation = f.session.generation();

        f.dispatcher
            .enqueue(Command::Authentication.id(), vec![1, 2, 3, 4]);
        assert_eq!(
            f.inbound.recv().await.unwrap(),
            Inbound::Authenticated { generation }
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_an_error() {
        let f = fixture(MockSender::status(200), 5);
        f.dispatcher.enqueue(Command::GetEncryptedQR.id(), Vec::new());
        wait_until(|| !f.notifier.errors().is_empty()).await;
        assert!(f.notifier.errors()[0].1.contains("Empty response"));
    }

    #[tokio::test]
    async fn test_orphaned_response_is_dropped() {
        let reply = BASE64.encode(b"anything");
        let mut f = fixture(
            MockSender::new(move |_| Ok(RelayResponse::new(200, reply.clone()))).gated(),
            5,
        );
        f.session
            .lock()
            .begin_key_exchange([1; QR_KEY_LEN], "ab".into(), "relay".into());

        f.dispatcher.enqueue(Command::GetEncryptedQR.id(), Vec::new());
        wait_until(|| f.sender.current() == 1).await;
        f.session.lock().reset(test_identity().clone());
        f.sender.release(1);

        wait_until(|| f.dispatcher.in_flight() == 0).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(f.inbound.try_recv().is_err());
        assert!(f.notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn test_drain_discards_queued_requests() {
        let f = fixture(MockSender::status(404).gated(), 1);
        for _ in 0..3 {
            f.dispatcher.enqueue(Command::GetPushNotifications.id(), Vec::new());
        }
        wait_until(|| f.sender.current() == 1).await;

        assert_eq!(f.dispatcher.drain_pending(), 2);
        f.sender.release(3);
        wait_until(|| f.dispatcher.in_flight() == 0).await;
        assert_eq!(f.sender.request_count(), 1);
    }
}
