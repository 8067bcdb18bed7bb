//! Shared session record
//!
//! One session exists at a time. Everything the handshake negotiates lives
//! here behind a single lock so that a reset and a late `Pair` can never
//! interleave field by field. The lock is never held across an await.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

use crypto_session::{ClientIdentity, EncryptionType, SessionCipher};
use shared_protocol::QR_KEY_LEN;

/// Pairing state of the current session
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    /// Bumped on every reset; responses to older generations are orphaned
    generation: u64,
    identity: Option<ClientIdentity>,
    server_id: Option<String>,
    entry_point: Option<String>,
    /// Single-use key protecting the RSA exchange
    qr_key: Option<[u8; QR_KEY_LEN]>,
    cipher: SessionCipher,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            generation: 0,
            identity: None,
            server_id: None,
            entry_point: None,
            qr_key: None,
            cipher: SessionCipher::None,
        }
    }
}

impl Session {
    /// Discard everything and start over with a fresh identity.
    /// Returns the new generation.
    pub fn reset(&mut self, identity: ClientIdentity) -> u64 {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            identity: Some(identity),
            ..Self::default()
        };
        info!(
            "Session {} reset (generation {}), client id {}",
            self.id,
            generation,
            self.client_id().unwrap_or_default()
        );
        generation
    }

    /// Store what the scanned QR code carried
    pub fn begin_key_exchange(
        &mut self,
        qr_key: [u8; QR_KEY_LEN],
        server_id: String,
        entry_point: String,
    ) {
        self.qr_key = Some(qr_key);
        self.server_id = Some(server_id);
        self.entry_point = Some(entry_point);
    }

    /// Hand out the QR key once; later calls return `None`
    pub fn take_qr_key(&mut self) -> Option<[u8; QR_KEY_LEN]> {
        self.qr_key.take()
    }

    /// True until the key exchange reply has been decrypted
    pub fn has_qr_key(&self) -> bool {
        self.qr_key.is_some()
    }

    /// Replace the payload transform
    pub fn set_cipher(&mut self, cipher: SessionCipher) {
        info!("Session {} encryption set to {}", self.id, cipher.kind());
        self.cipher = cipher;
    }

    /// Random id assigned on every reset
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of resets so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// RSA identity generated for this session
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    /// Hex client id derived from the identity
    pub fn client_id(&self) -> Option<&str> {
        self.identity.as_ref().map(ClientIdentity::client_id)
    }

    /// Hex server id from the QR code
    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    /// Entry point text from the QR code
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Transform applied to regular traffic
    pub fn cipher(&self) -> &SessionCipher {
        &self.cipher
    }

    /// Copy of the non-secret fields
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            generation: self.generation,
            client_id: self.client_id().map(str::to_string),
            server_id: self.server_id.clone(),
            entry_point: self.entry_point.clone(),
            encryption: self.cipher.kind(),
        }
    }
}

/// Key-free copy of the session, safe to hand to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub generation: u64,
    pub client_id: Option<String>,
    pub server_id: Option<String>,
    pub entry_point: Option<String>,
    pub encryption: EncryptionType,
}

/// Shared handle to the one session
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access; do not hold across an await
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock()
    }

    /// Current session generation
    pub fn generation(&self) -> u64 {
        self.0.lock().generation
    }

    /// Snapshot of the current session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.0.lock().snapshot()
    }
}
