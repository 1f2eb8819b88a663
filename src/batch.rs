use crate::encoder::ImageRecord;
use crate::error::{Result, TransportError, UploadError};
use crate::summary::{BatchResult, UploadSummary};
use crate::transport::{BatchRequest, Transport};
use crate::validation::validate_batch_size;
use crate::{info, info_inline, warn};
use std::future::Future;
use std::ops::Range;

const ITEM_TOO_LARGE: &str = "payload too large to upload even as a single image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Advancing,
    Shrinking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub position: usize,
    pub batch_size: usize,
    pub configured_batch_size: usize,
    pub phase: Phase,
}

impl Cursor {
    /// A zero batch size is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            position: 0,
            batch_size,
            configured_batch_size: batch_size,
            phase: Phase::Advancing,
        }
    }

    /// Index range of the next candidate batch, or `None` once every item is resolved.
    pub fn next_batch(&self, total: usize) -> Option<Range<usize>> {
        if self.position >= total {
            return None;
        }
        Some(self.position..(self.position + self.batch_size).min(total))
    }

    pub fn is_done(&self, total: usize) -> bool {
        self.position >= total
    }

    /// 1-based batch number, counted in units of the configured size.
    pub fn batch_number(&self) -> usize {
        self.position / self.configured_batch_size + 1
    }

    fn advance(self, attempted: usize) -> Self {
        Self {
            position: self.position + attempted,
            phase: Phase::Advancing,
            ..self
        }
    }

    fn shrink(self) -> Self {
        Self {
            batch_size: (self.batch_size / 2).max(1),
            phase: Phase::Shrinking,
            ..self
        }
    }
}

/// What a single attempt did to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Completed,
    Shrunk { from: usize, to: usize },
    ItemRejected,
    BatchFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub cursor: Cursor,
    pub summary: UploadSummary,
}

impl RunState {
    pub fn new(batch_size: usize) -> Self {
        Self {
            cursor: Cursor::new(batch_size),
            summary: UploadSummary::new(),
        }
    }

    /// Applies the outcome of sending `batch`, which must be the slice the
    /// cursor currently points at.
    ///
    /// * success: merge the server's counts, advance by the attempted length
    /// * 413 with `batch_size > 1`: halve the size (floor 1), retry the same offset
    /// * 413 with `batch_size == 1`: record the item as rejected and skip it
    /// * any other failure: record the whole batch as failed and skip it
    ///
    /// The position never moves on a shrink and the batch size never grows
    /// back, so each offset costs at most `log2(batch_size)` extra attempts.
    pub fn step(
        self,
        batch: &[ImageRecord],
        outcome: std::result::Result<BatchResult, TransportError>,
    ) -> (Self, Transition) {
        let RunState { cursor, summary } = self;
        let attempted = batch.len();

        match outcome {
            Ok(result) => (
                RunState {
                    cursor: cursor.advance(attempted),
                    summary: summary.merge(result),
                },
                Transition::Completed,
            ),
            Err(TransportError::PayloadTooLarge) if cursor.batch_size > 1 => {
                let shrunk = cursor.shrink();
                (
                    RunState {
                        cursor: shrunk,
                        summary,
                    },
                    Transition::Shrunk {
                        from: cursor.batch_size,
                        to: shrunk.batch_size,
                    },
                )
            }
            Err(TransportError::PayloadTooLarge) => {
                let result = match batch.first() {
                    Some(item) if attempted == 1 => {
                        BatchResult::item_rejected(item.filename.clone(), ITEM_TOO_LARGE)
                    }
                    _ => BatchResult::batch_failure(attempted, ITEM_TOO_LARGE),
                };
                (
                    RunState {
                        cursor: cursor.advance(attempted),
                        summary: summary.merge(result),
                    },
                    Transition::ItemRejected,
                )
            }
            Err(TransportError::Failed(reason)) => (
                RunState {
                    cursor: cursor.advance(attempted),
                    summary: summary.merge_batch_failure(attempted, reason.clone()),
                },
                Transition::BatchFailed(reason),
            ),
        }
    }

    pub fn is_done(&self, total: usize) -> bool {
        self.cursor.is_done(total)
    }
}

/// Drives the state machine from recorded outcomes without any transport.
///
/// Stops when every item is resolved or the outcomes run out. Returns the
/// final state and every transition taken.
pub fn replay<I>(items: &[ImageRecord], batch_size: usize, outcomes: I) -> (RunState, Vec<Transition>)
where
    I: IntoIterator<Item = std::result::Result<BatchResult, TransportError>>,
{
    let mut state = RunState::new(batch_size);
    let mut transitions = Vec::new();
    let mut outcomes = outcomes.into_iter();

    while let Some(range) = state.cursor.next_batch(items.len()) {
        let Some(outcome) = outcomes.next() else {
            break;
        };
        let (next, transition) = state.step(&items[range], outcome);
        state = next;
        transitions.push(transition);
    }

    (state, transitions)
}

/// Uploads prepared records through a `Transport`, one batch at a time.
pub struct BatchUploader<T: Transport> {
    transport: T,
    batch_size: usize,
}

impl<T: Transport> BatchUploader<T> {
    pub fn new(transport: T, batch_size: usize) -> Result<Self> {
        Ok(Self {
            transport,
            batch_size: validate_batch_size(batch_size)?,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn upload(&self, items: &[ImageRecord]) -> UploadSummary {
        self.upload_until(items, std::future::pending::<()>()).await
    }

    /// Like `upload`, but stops before the next attempt resolves once
    /// `interrupt` completes. Results merged so far are kept and the summary
    /// is marked interrupted.
    pub async fn upload_until<F>(&self, items: &[ImageRecord], interrupt: F) -> UploadSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);

        let total = items.len();
        let total_batches = total.div_ceil(self.batch_size);
        let mut state = RunState::new(self.batch_size);

        info!(
            "\n🚀 Uploading {} images in batches of {}...",
            total, self.batch_size
        );

        while let Some(range) = state.cursor.next_batch(total) {
            let batch = &items[range];
            info_inline!(
                "📤 Uploading batch {}/{} ({} images)... ",
                state.cursor.batch_number(),
                total_batches,
                batch.len()
            );

            let request = BatchRequest::new(batch);
            let outcome = tokio::select! {
                biased;
                _ = &mut interrupt => None,
                outcome = self.transport.send_batch(&request) => Some(outcome),
            };

            let Some(outcome) = outcome else {
                info!("");
                warn!(
                    "Interrupted: {} of {} images were not attempted",
                    total - state.cursor.position,
                    total
                );
                state.summary.interrupted = true;
                break;
            };

            let (next, transition) = state.step(batch, outcome);
            report_transition(&transition, next.summary.batch_results.last());
            state = next;
        }

        state.summary
    }
}

fn report_transition(transition: &Transition, result: Option<&BatchResult>) {
    match transition {
        Transition::Completed => {
            if let Some(result) = result {
                info!("✅ {} successful, {} failed", result.successful, result.failed);
                for failure in &result.failures {
                    info!("    ❌ {}: {}", failure.filename, failure.error);
                }
            }
        }
        Transition::Shrunk { to, .. } => {
            info!("⚠️  Payload too large, retrying with batch size {}", to);
        }
        Transition::ItemRejected => {
            info!("❌ Failed: {}", ITEM_TOO_LARGE);
        }
        Transition::BatchFailed(reason) => {
            info!("❌ Failed: {}", reason);
        }
    }
}

/// Blocking wrapper around [`BatchUploader::upload`].
pub fn upload_bulk_sync<T: Transport>(uploader: &BatchUploader<T>, items: &[ImageRecord]) -> Result<UploadSummary> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| UploadError::Runtime(format!("Failed to create runtime: {}", e)))?;

    Ok(runtime.block_on(uploader.upload(items)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::ItemFailure;
    use crate::transport::MockTransport;

    fn records(n: usize) -> Vec<ImageRecord> {
        (0..n)
            .map(|i| ImageRecord::new(format!("{}.jpg", i), b"x", 1, 1))
            .collect()
    }

    fn ok(n: usize) -> std::result::Result<BatchResult, TransportError> {
        Ok(BatchResult::new(n, 0, vec![]))
    }

    #[test]
    fn test_cursor_next_batch_at_tail() {
        let cursor = Cursor::new(4);
        assert_eq!(cursor.next_batch(3), Some(0..3));
        assert_eq!(cursor.next_batch(0), None);
    }

    #[test]
    fn test_cursor_zero_batch_size_is_clamped() {
        assert_eq!(Cursor::new(0).batch_size, 1);
    }

    #[test]
    fn test_step_success_advances_by_attempted_length() {
        let items = records(5);
        // Server claims fewer successes than were sent; the cursor still moves by 2.
        let (state, transition) = RunState::new(2).step(&items[0..2], Ok(BatchResult::new(1, 0, vec![])));

        assert_eq!(transition, Transition::Completed);
        assert_eq!(state.cursor.position, 2);
        assert_eq!(state.summary.total_successful, 1);
    }

    #[test]
    fn test_step_too_large_shrinks_without_advancing() {
        let items = records(10);
        let (state, transition) =
            RunState::new(10).step(&items, Err(TransportError::PayloadTooLarge));

        assert_eq!(transition, Transition::Shrunk { from: 10, to: 5 });
        assert_eq!(state.cursor.position, 0);
        assert_eq!(state.cursor.batch_size, 5);
        assert_eq!(state.cursor.phase, Phase::Shrinking);
        assert!(state.summary.batch_results.is_empty());
    }

    #[test]
    fn test_step_too_large_at_size_one_rejects_item() {
        let items = records(3);
        let (state, transition) =
            RunState::new(1).step(&items[0..1], Err(TransportError::PayloadTooLarge));

        assert_eq!(transition, Transition::ItemRejected);
        assert_eq!(state.cursor.position, 1);
        assert_eq!(state.summary.total_failed, 1);
        assert_eq!(
            state.summary.batch_results[0].failures,
            vec![ItemFailure {
                filename: "0.jpg".to_string(),
                error: ITEM_TOO_LARGE.to_string(),
            }]
        );
    }

    #[test]
    fn test_step_generic_failure_fails_whole_batch() {
        let items = records(3);
        let (state, transition) =
            RunState::new(3).step(&items, Err(TransportError::failed("HTTP 502: bad gateway")));

        assert_eq!(transition, Transition::BatchFailed("HTTP 502: bad gateway".to_string()));
        assert_eq!(state.cursor.position, 3);
        assert_eq!(state.summary.total_failed, 3);
        assert_eq!(state.cursor.phase, Phase::Advancing);
    }

    #[test]
    fn test_shrink_sequence_halves_to_one() {
        let items = records(10);
        let outcomes = vec![
            Err(TransportError::PayloadTooLarge),
            Err(TransportError::PayloadTooLarge),
            Err(TransportError::PayloadTooLarge),
            ok(1),
        ];
        let (state, transitions) = replay(&items, 10, outcomes);

        assert_eq!(
            transitions[..3],
            [
                Transition::Shrunk { from: 10, to: 5 },
                Transition::Shrunk { from: 5, to: 2 },
                Transition::Shrunk { from: 2, to: 1 },
            ]
        );
        assert_eq!(state.cursor.position, 1);
        assert_eq!(state.cursor.batch_size, 1);
    }

    #[test]
    fn test_batch_size_never_grows_back() {
        let items = records(8);
        let mut outcomes = vec![Err(TransportError::PayloadTooLarge)];
        outcomes.extend((0..4).map(|_| ok(2)));
        let (state, _) = replay(&items, 4, outcomes);

        assert!(state.is_done(items.len()));
        assert_eq!(state.cursor.batch_size, 2);
        assert_eq!(state.summary.batch_results.len(), 4);
    }

    #[test]
    fn test_replay_stops_when_outcomes_run_out() {
        let items = records(6);
        let (state, transitions) = replay(&items, 2, vec![ok(2)]);
        assert_eq!(transitions.len(), 1);
        assert_eq!(state.cursor.position, 2);
        assert!(!state.is_done(items.len()));
    }

    #[test]
    fn test_uploader_rejects_zero_batch_size() {
        let result = BatchUploader::new(MockTransport::new(), 0);
        assert!(matches!(result, Err(UploadError::InvalidBatchSize(0))));
    }

    #[tokio::test]
    async fn test_upload_converges_to_single_items() {
        let transport = MockTransport::rejecting_over(1);
        let items = records(5);
        let uploader = BatchUploader::new(&transport, 4).unwrap();

        let summary = uploader.upload(&items).await;

        assert_eq!(summary.total_successful, 5);
        assert_eq!(summary.total_failed, 0);
        assert_eq!(summary.batch_results.len(), 5);
        // 4 -> 2 -> 1, then five single-item successes.
        assert_eq!(transport.call_count(), 7);
        assert!(transport.calls()[2..].iter().all(|batch| batch.len() == 1));
    }

    #[tokio::test]
    async fn test_upload_always_too_large_terminates() {
        let transport = MockTransport::always_too_large();
        let items = records(3);
        let uploader = BatchUploader::new(&transport, 2).unwrap();

        let summary = uploader.upload(&items).await;

        assert_eq!(summary.total_successful, 0);
        assert_eq!(summary.total_failed, 3);
        assert_eq!(summary.item_failures().count(), 3);
        // 2 items: 413, shrink to 1; then three single-item rejections.
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn test_upload_generic_failure_in_middle_batch() {
        let transport = MockTransport::scripted(vec![
            ok(2),
            Err(TransportError::failed("connection reset")),
            ok(1),
        ]);
        let items = records(5);
        let uploader = BatchUploader::new(&transport, 2).unwrap();

        let summary = uploader.upload(&items).await;

        assert_eq!(summary.total_successful, 3);
        assert_eq!(summary.total_failed, 2);
        assert_eq!(summary.batch_results.len(), 3);
        assert!(summary.batch_results[1].is_batch_failure());
        assert_eq!(
            transport.calls(),
            vec![
                vec!["0.jpg".to_string(), "1.jpg".to_string()],
                vec!["2.jpg".to_string(), "3.jpg".to_string()],
                vec!["4.jpg".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_empty_input_makes_no_calls() {
        let transport = MockTransport::new();
        let uploader = BatchUploader::new(&transport, 10).unwrap();

        let summary = uploader.upload(&[]).await;

        assert_eq!(summary, UploadSummary::new());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_until_ready_interrupt_keeps_nothing_pending() {
        let transport = MockTransport::new();
        let items = records(4);
        let uploader = BatchUploader::new(&transport, 2).unwrap();

        let summary = uploader.upload_until(&items, std::future::ready(())).await;

        assert!(summary.interrupted);
        assert_eq!(summary.total_resolved(), 0);
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_upload_bulk_sync() {
        let items = records(3);
        let uploader = BatchUploader::new(MockTransport::new(), 2).unwrap();
        let summary = upload_bulk_sync(&uploader, &items).unwrap();
        assert_eq!(summary.total_successful, 3);
    }
}
