//! Content-defined chunking (CDC) for item content.
//!
//! Uses a gear-hash rolling window over a fixed, deterministically-generated
//! table: identical content always produces identical chunk boundaries, so
//! re-setting the same content after a round-trip reuses the same
//! `chunkUid`s and nothing is re-uploaded.

use std::sync::OnceLock;

/// Below this many bytes, content is never split further.
pub const MIN_CHUNK_SIZE: usize = 16 * 1024;
/// Expected average chunk size.
pub const TARGET_CHUNK_SIZE: usize = 32 * 1024;
/// A chunk is force-cut at this size even without a hash boundary.
pub const MAX_CHUNK_SIZE: usize = 128 * 1024;

// log2(TARGET_CHUNK_SIZE) — tunes how often the rolling hash hits a boundary.
const MASK_BITS: u32 = 15;

fn splitmix64(x: u64) -> u64 {
    let x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A 256-entry gear table, generated once from a fixed seed. Not a secret —
/// just needs to be stable across builds so chunking stays deterministic.
fn gear_table() -> &'static [u64; 256] {
    static TABLE: OnceLock<[u64; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u64; 256];
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        for slot in table.iter_mut() {
            seed = splitmix64(seed);
            *slot = seed;
        }
        table
    })
}

/// Split `data` into content-defined chunks. A payload at or below
/// [`MIN_CHUNK_SIZE`] (including empty content) always yields exactly one
/// chunk.
pub fn chunk_content(data: &[u8]) -> Vec<&[u8]> {
    if data.len() <= MIN_CHUNK_SIZE {
        return vec![data];
    }

    let table = gear_table();
    let mask: u64 = (1u64 << MASK_BITS) - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut hash: u64 = 0;

    for i in 0..data.len() {
        hash = (hash << 1).wrapping_add(table[data[i] as usize]);
        let len = i - start + 1;
        if len >= MAX_CHUNK_SIZE || (len >= MIN_CHUNK_SIZE && hash & mask == 0) {
            chunks.push(&data[start..=i]);
            start = i + 1;
            hash = 0;
        }
    }
    if start < data.len() {
        chunks.push(&data[start..]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_one_chunk() {
        let data = b"hello world";
        let chunks = chunk_content(data);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], data);
    }

    #[test]
    fn empty_payload_is_one_empty_chunk() {
        let chunks = chunk_content(b"");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 0);
    }

    #[test]
    fn chunking_is_deterministic() {
        let data = vec![0u8; 5 * MAX_CHUNK_SIZE];
        let a = chunk_content(&data);
        let b = chunk_content(&data);
        let a_lens: Vec<usize> = a.iter().map(|c| c.len()).collect();
        let b_lens: Vec<usize> = b.iter().map(|c| c.len()).collect();
        assert_eq!(a_lens, b_lens);
    }

    #[test]
    fn chunking_respects_max_size() {
        let data = vec![7u8; 3 * MAX_CHUNK_SIZE];
        let chunks = chunk_content(&data);
        assert!(chunks.iter().all(|c| c.len() <= MAX_CHUNK_SIZE));
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn prefix_reuse_keeps_leading_chunks_stable() {
        let mut data = vec![0u8; 4 * MAX_CHUNK_SIZE];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let before = chunk_content(&data);
        let n = before.len();
        data.extend_from_slice(b"appended tail bytes");
        let after = chunk_content(&data);
        // Every chunk but the last should be identical: CDC's whole point.
        for i in 0..n - 1 {
            assert_eq!(before[i], after[i]);
        }
    }
}
