//! Payload masking (RFC 6455 Section 5.3).
//!
//! Client frames are XOR-masked with a 4-byte key. Masking is an involution:
//! applying the same key twice restores the original bytes.

/// XOR `data` in place with the repeating 4-byte `mask`.
///
/// Processes aligned 4-byte words via `u32` XOR and finishes the tail
/// byte-by-byte.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let mask_word = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(word ^ mask_word).to_ne_bytes());
    }

    let tail_offset = data.len() & !3;
    for (i, byte) in data[tail_offset..].iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// Generate a fresh masking key.
///
/// Falls back to a time-derived key if the OS entropy source fails; the key
/// only needs to be unpredictable enough to defeat cache poisoning, not
/// cryptographically strong.
#[must_use]
pub fn generate_mask() -> [u8; 4] {
    let mut key = [0u8; 4];
    if getrandom::getrandom(&mut key).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x9E37_79B9);
        key = nanos.to_le_bytes();
    }
    key
}
