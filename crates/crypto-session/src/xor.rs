//! XOR-AB keystream cipher
//!
//! Self-inverse: applying it twice with the same key restores the input.
//! Used with the QR key to protect the RSA exchange, and as the session
//! cipher when the remote device does not hand over an AES key.

use crate::keystream::{bytes_le, keystream_hash, words_le};

/// Encrypt or decrypt `data` under `key`
pub fn xor_ab(key: &[u8], data: &[u8]) -> Vec<u8> {
    let data_len = data.len();

    let mut key_words = words_le(key, key.len().max(4));
    key_words[0] ^= data_len as u32;
    let mut working_key = bytes_le(&key_words);

    let data_words = words_le(data, data_len.div_ceil(4) * 4);
    let mut out = Vec::with_capacity(data_words.len());

    for (i, word) in data_words.iter().enumerate() {
        let p = i % key_words.len();
        if p == 0 {
            working_key = keystream_hash(&working_key).to_vec();
            key_words = words_le(&working_key, working_key.len());
        }
        out.push(word ^ key_words[p]);
    }

    let mut bytes = bytes_le(&out);
    bytes.truncate(data_len);
    bytes
}
