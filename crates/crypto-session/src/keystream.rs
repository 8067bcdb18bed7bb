//! Keystream hash driving the XOR-AB cipher
//!
//! A deterministic 256-bit mixing function. It is not a cryptographic hash:
//! no preimage or collision resistance is claimed. Both ends of the relay
//! must produce identical output bit for bit.

use crate::KEYSTREAM_HASH_SIZE;

const MASK: u32 = 0x5555_5555;

const SEED: [u32; 8] = [
    0x5555_5555,
    0x3333_3333,
    0x9249_2492,
    0x1C71_C71C,
    !0x5555_5555,
    !0x3333_3333,
    !0x9249_2492,
    !0x1C71_C71C,
];

/// Mix `input` into 32 bytes
pub fn keystream_hash(input: &[u8]) -> [u8; KEYSTREAM_HASH_SIZE] {
    let len = input.len() as u32;
    let padded = input.len().div_ceil(KEYSTREAM_HASH_SIZE) * KEYSTREAM_HASH_SIZE;
    let words = words_le(input, padded);

    let mut acc = SEED;

    let mut x = len ^ MASK;
    x ^= x << (1 + len % 30);
    x ^= MASK;
    x ^= x >> (1 + len % 29);

    for group in words.chunks(8) {
        let mut v = [0u32; 8];
        v[..group.len()].copy_from_slice(group);

        x ^= v.iter().fold(0, |folded, word| folded ^ word);
        x ^= MASK;
        x ^= x << (1 + x % 28);
        x ^= MASK;
        x ^= x >> (1 + x % 29);
        x ^= MASK;
        x ^= x << (1 + x % 30);

        for (p, word) in acc.iter_mut().zip(v) {
            *p ^= word ^ x;
        }
    }

    let mut out = [0u8; KEYSTREAM_HASH_SIZE];
    for (dst, word) in out.chunks_exact_mut(4).zip(acc) {
        dst.copy_from_slice(&word.to_le_bytes());
    }
    out
}

/// Little-endian words of `bytes` zero-extended to `padded_len`.
/// Trailing bytes that do not fill a whole word are dropped.
pub(crate) fn words_le(bytes: &[u8], padded_len: usize) -> Vec<u32> {
    let mut buf = bytes.to_vec();
    buf.resize(padded_len, 0);
    buf.chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect()
}

pub(crate) fn bytes_le(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input_yields_seed() {
        let out = keystream_hash(&[]);
        // Empty input has no groups, so only the seed words remain.
        assert_eq!(&out[0..4], &[0x55; 4]);
        assert_eq!(&out[4..8], &[0x33; 4]);
        assert_eq!(&out[8..12], &[0x92, 0x24, 0x49, 0x92]);
        assert_eq!(&out[12..16], &[0x1C, 0xC7, 0x71, 0x1C]);
        assert_eq!(&out[16..20], &[0xAA; 4]);
    }

    #[test]
    fn test_known_answer_short_input() {
        assert_eq!(
            hex::encode(keystream_hash(&[1, 2, 3, 4, 5])),
            "75adac7f17c9c91db3deb3bc3d3d8b328b505084ed3636e24c214c43c2c274cd"
        );
    }

    #[test]
    fn test_known_answer_three_groups() {
        let data: Vec<u8> = (0..70).collect();
        assert_eq!(
            hex::encode(keystream_hash(&data)),
            "7ec69e041ca4ba21f9f6c0807715f80ec17823b8a71e45de06093f7f88ea07f1"
        );
    }

    #[test]
    fn test_length_is_mixed_in() {
        // Same padded words, different unpadded length.
        assert_ne!(keystream_hash(&[0]), keystream_hash(&[0, 0]));
        assert_ne!(keystream_hash(&[]), keystream_hash(&[0]));
    }

    #[test]
    fn test_multi_group_input() {
        let data: Vec<u8> = (0..=200u8).collect();
        let a = keystream_hash(&data);
        let mut changed = data.clone();
        changed[150] ^= 1;
        assert_ne!(a, keystream_hash(&changed));
    }

    #[test]
    fn test_words_drop_partial_tail() {
        assert_eq!(words_le(&[1, 0, 0, 0, 9], 5), vec![1]);
        assert_eq!(words_le(&[1], 8), vec![1, 0]);
        assert_eq!(bytes_le(&[0x0403_0201]), vec![1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn prop_hash_is_pure(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            let first = keystream_hash(&data);
            prop_assert_eq!(first.len(), 32);
            prop_assert_eq!(first, keystream_hash(&data));
        }
    }
}
