use proptest::prelude::*;
use vsync_crypto::chunking::{chunk_content, MAX_CHUNK_SIZE};

proptest! {
    #[test]
    fn chunks_reassemble_to_original(data in prop::collection::vec(any::<u8>(), 0..200_000)) {
        let chunks = chunk_content(&data);
        let mut reassembled = Vec::with_capacity(data.len());
        for c in &chunks {
            reassembled.extend_from_slice(c);
        }
        prop_assert_eq!(reassembled, data);
    }

    #[test]
    fn no_chunk_exceeds_max_size(data in prop::collection::vec(any::<u8>(), 0..200_000)) {
        let chunks = chunk_content(&data);
        for c in &chunks {
            prop_assert!(c.len() <= MAX_CHUNK_SIZE);
        }
    }

    #[test]
    fn chunking_is_pure(data in prop::collection::vec(any::<u8>(), 0..100_000)) {
        let a: Vec<usize> = chunk_content(&data).iter().map(|c| c.len()).collect();
        let b: Vec<usize> = chunk_content(&data).iter().map(|c| c.len()).collect();
        prop_assert_eq!(a, b);
    }
}
