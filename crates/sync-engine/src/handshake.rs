//! Pairing handshake
//!
//! QR scan, RSA key exchange, `Pair`, then `Authentication`. Each step is
//! driven by a decoded relay response; a failure anywhere lands in
//! `Failed` until the next scan.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crypto_session::{
    AesCbc, ClientIdentity, CryptoError, SessionCipher, auth_verifier, import_public_key,
    rsa_encrypt_blocks,
};
use shared_protocol::{ClientSettings, Command, KeyExchangePayload, PairRequest, QrPayload};

use crate::{
    Dispatcher, EngineError, EngineEvent, EngineResult, Notifier, SecurityError, SessionHandle,
    StateError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    AwaitingQr,
    KeyExchangePending,
    Paired,
    Authenticated,
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct HandshakeCoordinator {
    session: SessionHandle,
    dispatcher: Dispatcher,
    notifier: Arc<dyn Notifier>,
    state: Mutex<HandshakeState>,
    pin: u32,
    client_chunk_size: u32,
    thumbnail_size: u16,
}

impl HandshakeCoordinator {
    pub(crate) fn new(
        session: SessionHandle,
        dispatcher: Dispatcher,
        notifier: Arc<dyn Notifier>,
        settings: &ClientSettings,
        pin: u32,
    ) -> Self {
        Self {
            session,
            dispatcher,
            notifier,
            state: Mutex::new(HandshakeState::Idle),
            pin,
            client_chunk_size: settings.chunk_size,
            thumbnail_size: settings.thumbnail_size,
        }
    }

    pub fn state(&self) -> HandshakeState {
        *self.state.lock()
    }

    /// Start pairing from a scanned QR code (base64 text). Generates a new
    /// RSA identity on the blocking pool and discards the previous session.
    pub async fn scan_qr(&self, qr_text: &str) -> EngineResult<()> {
        self.restart();

        let identity = tokio::task::spawn_blocking(ClientIdentity::generate)
            .await
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()));
        let result = match identity {
            Ok(Ok(identity)) => self.begin_pairing(qr_text, identity),
            Ok(Err(e)) | Err(e) => Err(e.into()),
        };

        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    /// Start pairing with an already generated identity
    pub fn scan_qr_with_identity(&self, qr_text: &str, identity: ClientIdentity) -> EngineResult<()> {
        self.restart();
        let result = self.begin_pairing(qr_text, identity);
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    /// Any earlier attempt is over; observers see Idle before the new scan
    fn restart(&self) {
        self.set_state(HandshakeState::Idle);
        self.set_state(HandshakeState::AwaitingQr);
    }

    fn begin_pairing(&self, qr_text: &str, identity: ClientIdentity) -> EngineResult<()> {
        self.session.lock().reset(identity);
        self.dispatcher.drain_pending();

        let qr = QrPayload::from_base64(qr_text)?;
        let server_id = qr.server_id_hex();
        info!("Pairing with server {} via {:?}", server_id, qr.entry_point);
        self.session
            .lock()
            .begin_key_exchange(qr.qr_key, server_id, qr.entry_point);

        self.set_state(HandshakeState::KeyExchangePending);
        self.dispatcher
            .enqueue(Command::GetEncryptedQR.id(), Vec::new());
        Ok(())
    }

    /// Remote public key arrived; announce our settings under it
    pub(crate) fn on_key_exchange(&self, generation: u64, plain: &[u8]) -> EngineResult<()> {
        if self.session.generation() != generation {
            debug!("Key exchange for discarded generation {} ignored", generation);
            return Ok(());
        }
        let payload = KeyExchangePayload::parse(plain)?;
        let remote = import_public_key(&payload.modulus, &payload.exponent)?;

        let identity = {
            let mut session = self.session.lock();
            if session.generation() != generation {
                debug!("Key exchange for discarded generation {} ignored", generation);
                return Ok(());
            }
            let identity = session.identity().cloned().ok_or(StateError::NoSession)?;
            session.set_cipher(SessionCipher::Rsa {
                remote: remote.clone(),
                local: identity.private_key().clone(),
            });
            identity
        };

        let settings = ClientSettings {
            chunk_size: self.client_chunk_size,
            thumbnail_size: self.thumbnail_size,
            public_key: identity.public_key_bytes().to_vec(),
        };
        let encrypted = rsa_encrypt_blocks(&remote, &settings.encode())?;
        self.dispatcher.enqueue(Command::SetClient.id(), encrypted);
        self.set_state(HandshakeState::Paired);
        Ok(())
    }

    /// Remote device hands over the session key and a challenge
    pub(crate) fn on_pair(&self, generation: u64, params: Vec<Vec<u8>>) -> EngineResult<()> {
        if self.session.generation() != generation {
            debug!("Pair for discarded generation {} ignored", generation);
            return Ok(());
        }
        let pair = PairRequest::from_params(params)?;
        let actual = pair.client_id_hex();

        {
            let mut session = self.session.lock();
            if session.generation() != generation {
                debug!("Pair for discarded generation {} ignored", generation);
                return Ok(());
            }
            let expected = session.client_id().ok_or(StateError::NoSession)?;
            if expected != actual {
                return Err(SecurityError::ClientIdMismatch {
                    expected: expected.to_string(),
                    actual,
                }
                .into());
            }
            if session.cipher().is_symmetric() {
                return Err(SecurityError::KeyReassignmentAttempt.into());
            }

            let cipher = if pair.device_key.is_empty() {
                SessionCipher::xor(&pair.device_iv)
            } else {
                SessionCipher::Aes(AesCbc::new(&pair.device_key, &pair.device_iv)?)
            };
            session.set_cipher(cipher);
        }

        let verify = auth_verifier(&pair.challenge, self.pin);
        self.dispatcher
            .enqueue(Command::Authentication.id(), verify.to_vec());
        Ok(())
    }

    /// Returns false when the confirmation belongs to a discarded session
    pub(crate) fn on_authenticated(&self, generation: u64) -> bool {
        if self.session.generation() != generation {
            debug!("Authentication for discarded generation {} ignored", generation);
            return false;
        }
        self.set_state(HandshakeState::Authenticated);
        true
    }

    pub(crate) fn fail(&self, error: &EngineError) {
        warn!("Handshake failed: {}", error);
        self.set_state(HandshakeState::Failed);
        self.notifier.error(error);
    }

    fn set_state(&self, next: HandshakeState) {
        let previous = std::mem::replace(&mut *self.state.lock(), next);
        if previous != next {
            info!("Handshake {} -> {}", previous, next);
            self.notifier
                .event(&EngineEvent::HandshakeStateChanged(next));
        }
    }
}
