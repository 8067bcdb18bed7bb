//! Crypto Session - payload protection for the cloud relay
//!
//! Three interchangeable transforms selected by pairing state: blockwise
//! RSA-OAEP before a symmetric key exists, AES-CBC once the remote device
//! hands over a device key, and the XOR-AB keystream cipher as fallback.

mod aes_cbc;
mod error;
mod identity;
mod keystream;
mod oaep;
mod session;
mod xor;

pub use aes_cbc::*;
pub use error::*;
pub use identity::*;
pub use keystream::*;
pub use oaep::*;
pub use session::*;
pub use xor::*;

/// RSA key size used by both pairing parties
pub const RSA_KEY_BITS: usize = 2048;

/// Largest plaintext block that fits one OAEP-SHA256 block of a 2048-bit key
pub const RSA_PLAINTEXT_BLOCK: usize = 190;

/// Ciphertext block size for a 2048-bit key
pub const RSA_CIPHERTEXT_BLOCK: usize = RSA_KEY_BITS / 8;

/// AES block (and IV) size
pub const AES_BLOCK_SIZE: usize = 16;

/// Output size of the keystream hash
pub const KEYSTREAM_HASH_SIZE: usize = 32;
