//! Blockwise RSA-OAEP (SHA-256, MGF1-SHA-256, no label)
//!
//! One OAEP block of a 2048-bit key holds at most 190 bytes, so payloads
//! are cut into 190-byte plaintext blocks and 256-byte ciphertext blocks
//! and the per-block outputs are concatenated in order.

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::{CryptoError, CryptoResult, RSA_CIPHERTEXT_BLOCK, RSA_PLAINTEXT_BLOCK};

/// Build a public key from big-endian modulus and exponent bytes
pub fn import_public_key(modulus: &[u8], exponent: &[u8]) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::new(
        BigUint::from_bytes_be(modulus),
        BigUint::from_bytes_be(exponent),
    )
    .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Raw big-endian modulus without a sign byte
pub fn modulus_bytes(key: &RsaPublicKey) -> Vec<u8> {
    key.n().to_bytes_be()
}

/// Encrypt `data` in 190-byte blocks
pub fn rsa_encrypt_blocks(key: &RsaPublicKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut rng = OsRng;
    let mut out = Vec::with_capacity(data.len().div_ceil(RSA_PLAINTEXT_BLOCK) * RSA_CIPHERTEXT_BLOCK);

    for block in data.chunks(RSA_PLAINTEXT_BLOCK) {
        let encrypted = key
            .encrypt(&mut rng, Oaep::new::<Sha256>(), block)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        out.extend_from_slice(&encrypted);
    }

    Ok(out)
}

/// Decrypt `data` in 256-byte blocks
pub fn rsa_decrypt_blocks(key: &RsaPrivateKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());

    for block in data.chunks(RSA_CIPHERTEXT_BLOCK) {
        let decrypted = key
            .decrypt(Oaep::new::<Sha256>(), block)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;
        out.extend_from_slice(&decrypted);
    }

    Ok(out)
}
