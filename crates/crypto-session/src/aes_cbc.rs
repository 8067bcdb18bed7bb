//! AES-CBC with PKCS#7 padding under a fixed per-session IV
//!
//! The remote device sends one IV with the device key and expects it on
//! every message for the lifetime of the session. Reusing a CBC IV leaks
//! equality of message prefixes; it is kept for wire compatibility.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::{AES_BLOCK_SIZE, CryptoError, CryptoResult};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Device key and IV negotiated during pairing
#[derive(Clone)]
pub struct AesCbc {
    key: Zeroizing<Vec<u8>>,
    iv: [u8; AES_BLOCK_SIZE],
}

impl AesCbc {
    /// Accepts 128, 192 or 256-bit keys
    pub fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(CryptoError::InvalidKeyLength { actual: key.len() });
        }
        let iv: [u8; AES_BLOCK_SIZE] = iv.try_into().map_err(|_| CryptoError::InvalidIvLength {
            expected: AES_BLOCK_SIZE,
            actual: iv.len(),
        })?;

        Ok(Self {
            key: Zeroizing::new(key.to_vec()),
            iv,
        })
    }

    /// Encrypt with PKCS#7 padding; output is a whole number of blocks
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = self.key.as_slice();
        let iv = &self.iv[..];
        let ciphertext = match key.len() {
            16 => Aes128CbcEnc::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            24 => Aes192CbcEnc::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            _ => Aes256CbcEnc::new_from_slices(key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        };
        ciphertext.map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Decrypt and strip the padding. Wrong keys usually fail here.
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = self.key.as_slice();
        let iv = &self.iv[..];
        let plaintext = match key.len() {
            16 => Aes128CbcDec::new_from_slices(key, iv)
                .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
            24 => Aes192CbcDec::new_from_slices(key, iv)
                .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
            _ => Aes256CbcDec::new_from_slices(key, iv)
                .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
        }
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;

        plaintext.map_err(|_| CryptoError::Decryption("bad padding".to_string()))
    }
}

impl std::fmt::Debug for AesCbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbc")
            .field("key_bits", &(self.key.len() * 8))
            .finish_non_exhaustive()
    }
}
