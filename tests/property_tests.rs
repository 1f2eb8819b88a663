use bulk_uploader::{
    decode_payload, encode_payload, replay, BatchResult, ImageRecord, RunState, Transition,
    TransportError,
};
use proptest::prelude::*;

fn records(count: usize) -> Vec<ImageRecord> {
    (0..count)
        .map(|i| ImageRecord::new(format!("img_{:03}.jpg", i), &[i as u8; 4], 10, 10))
        .collect()
}

/// Runs the state machine against a server that accepts at most `limit` images.
fn run_against_limit(items: &[ImageRecord], batch_size: usize, limit: usize) -> (RunState, usize) {
    let mut state = RunState::new(batch_size);
    let mut attempts = 0;

    while let Some(range) = state.cursor.next_batch(items.len()) {
        let batch = &items[range];
        let outcome = if batch.len() > limit {
            Err(TransportError::PayloadTooLarge)
        } else {
            Ok(BatchResult::new(batch.len(), 0, Vec::new()))
        };
        state = state.step(batch, outcome).0;
        attempts += 1;
        assert!(attempts <= items.len() + 64, "state machine did not terminate");
    }

    (state, attempts)
}

fn outcome_strategy() -> impl Strategy<Value = u8> {
    0u8..3
}

proptest! {
    #[test]
    fn test_every_item_uploaded_under_size_limit(
        count in 0usize..80,
        batch_size in 1usize..32,
        limit in 1usize..32,
    ) {
        let items = records(count);
        let (state, attempts) = run_against_limit(&items, batch_size, limit);

        prop_assert!(state.is_done(count));
        prop_assert_eq!(state.summary.total_successful, count);
        prop_assert_eq!(state.summary.total_failed, 0);

        // At most one 413 per halving, plus one request per accepted batch.
        let halvings = usize::BITS as usize;
        prop_assert!(attempts <= count + halvings);
    }

    #[test]
    fn test_batch_size_stays_within_bounds(
        count in 1usize..60,
        batch_size in 1usize..40,
        codes in prop::collection::vec(outcome_strategy(), 0..200),
    ) {
        let items = records(count);
        let mut state = RunState::new(batch_size);

        for code in codes {
            let Some(range) = state.cursor.next_batch(items.len()) else {
                break;
            };
            let batch = &items[range];
            let outcome = match code {
                0 => Ok(BatchResult::new(batch.len(), 0, Vec::new())),
                1 => Err(TransportError::PayloadTooLarge),
                _ => Err(TransportError::failed("HTTP 502: bad gateway")),
            };
            state = state.step(batch, outcome).0;

            prop_assert!(state.cursor.batch_size >= 1);
            prop_assert!(state.cursor.batch_size <= batch_size);
            prop_assert!(state.cursor.position <= count);
            prop_assert_eq!(state.summary.total_resolved(), state.cursor.position);
        }
    }

    #[test]
    fn test_always_too_large_rejects_every_item(
        count in 0usize..40,
        batch_size in 1usize..20,
    ) {
        let items = records(count);
        let outcomes = std::iter::repeat_with(|| Err(TransportError::PayloadTooLarge));

        let (state, transitions) = replay(&items, batch_size, outcomes);

        prop_assert!(state.is_done(count));
        prop_assert_eq!(state.summary.total_successful, 0);
        prop_assert_eq!(state.summary.total_failed, count);
        let rejected = transitions
            .iter()
            .filter(|t| **t == Transition::ItemRejected)
            .count();
        prop_assert_eq!(rejected, count);
    }

    #[test]
    fn test_payload_encoding_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let encoded = encode_payload(&bytes);
        prop_assert_eq!(encoded.len(), bytes.len().div_ceil(3) * 4);
        prop_assert_eq!(decode_payload(&encoded).unwrap(), bytes);
    }
}
