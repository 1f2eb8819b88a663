use serde::{Deserialize, Serialize};

/// A single item the server (or the controller) reported as not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFailure {
    pub filename: String,
    pub error: String,
}

/// Outcome of one resolved batch attempt.
///
/// Counts are taken from the server response as reported; they are not
/// reconciled against the number of items that were sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub successful: usize,
    pub failed: usize,
    #[serde(default)]
    pub failures: Vec<ItemFailure>,
    /// Set when the whole batch failed at the transport level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_error: Option<String>,
}

impl BatchResult {
    pub fn new(successful: usize, failed: usize, failures: Vec<ItemFailure>) -> Self {
        Self {
            successful,
            failed,
            failures,
            batch_error: None,
        }
    }

    /// Synthetic result for a batch that never reached a successful response.
    pub fn batch_failure(count: usize, reason: impl Into<String>) -> Self {
        Self {
            successful: 0,
            failed: count,
            failures: Vec::new(),
            batch_error: Some(reason.into()),
        }
    }

    /// Synthetic result for a single item that is too large to send on its own.
    pub fn item_rejected(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            successful: 0,
            failed: 1,
            failures: vec![ItemFailure {
                filename: filename.into(),
                error: reason.clone(),
            }],
            batch_error: Some(reason),
        }
    }

    pub fn resolved(&self) -> usize {
        self.successful + self.failed
    }

    pub fn is_batch_failure(&self) -> bool {
        self.batch_error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub total_successful: usize,
    pub total_failed: usize,
    pub batch_results: Vec<BatchResult>,
    /// True when the run stopped before every item was attempted.
    pub interrupted: bool,
}

impl UploadSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one batch outcome into the running totals.
    pub fn merge(mut self, result: BatchResult) -> Self {
        self.total_successful += result.successful;
        self.total_failed += result.failed;
        self.batch_results.push(result);
        self
    }

    pub fn merge_batch_failure(self, count: usize, reason: impl Into<String>) -> Self {
        self.merge(BatchResult::batch_failure(count, reason))
    }

    /// Rebuilds a summary from a recorded sequence of batch outcomes.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = BatchResult>,
    {
        results.into_iter().fold(Self::new(), Self::merge)
    }

    pub fn total_resolved(&self) -> usize {
        self.total_successful + self.total_failed
    }

    pub fn has_failures(&self) -> bool {
        self.total_failed > 0
    }

    pub fn item_failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.batch_results.iter().flat_map(|r| r.failures.iter())
    }
}
