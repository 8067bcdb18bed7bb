//! Ephemeral RSA identity of this client

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{CryptoError, CryptoResult, RSA_KEY_BITS, modulus_bytes, rsa_decrypt_blocks};

/// RSA keypair plus the identifiers derived from it
#[derive(Clone)]
pub struct ClientIdentity {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    public_key_bytes: Vec<u8>,
    client_id: String,
}

impl ClientIdentity {
    /// Generate a fresh 2048-bit keypair. CPU-heavy; run it off the async executor.
    pub fn generate() -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self::from_private_key(private_key))
    }

    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_bytes = modulus_bytes(&public_key);
        let client_id = derive_client_id(&public_key_bytes);
        debug!("Derived client id {}", client_id);

        Self {
            private_key,
            public_key,
            public_key_bytes,
            client_id,
        }
    }

    /// Hex of the first 8 bytes of SHA-256 over the raw modulus
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Raw modulus bytes, as announced in `SetClient`
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }

    pub fn public_key_b64(&self) -> String {
        BASE64.encode(&self.public_key_bytes)
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Decrypt a blockwise RSA payload addressed to this client
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        rsa_decrypt_blocks(&self.private_key, ciphertext)
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Client id for a raw public key modulus
pub fn derive_client_id(public_key_bytes: &[u8]) -> String {
    let digest = sha256(public_key_bytes);
    hex::encode(&digest[..8])
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// Response to the remote device's authentication challenge:
/// first 4 bytes of `SHA-256(challenge ‖ int32LE(pin))`
pub fn auth_verifier(challenge: &[u8], pin: u32) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update(pin.to_le_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}
