use crate::encoder::ImageRecord;
use crate::error::{Result, TransportError};
use crate::summary::{BatchResult, ItemFailure};
use crate::verbose;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Longest slice of an error body kept in a diagnostic message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Request body: `{"images": [...]}`. Borrowed for the duration of one attempt.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchRequest<'a> {
    pub images: &'a [ImageRecord],
}

impl<'a> BatchRequest<'a> {
    pub fn new(images: &'a [ImageRecord]) -> Self {
        Self { images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.images.iter().map(|img| img.filename.clone()).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct BulkUploadResponse {
    #[serde(default)]
    successful: usize,
    #[serde(default)]
    failed: usize,
    #[serde(default)]
    results: BulkUploadResults,
}

#[derive(Debug, Default, Deserialize)]
struct BulkUploadResults {
    #[serde(default)]
    failed: Vec<ItemFailure>,
}

impl From<BulkUploadResponse> for BatchResult {
    fn from(response: BulkUploadResponse) -> Self {
        BatchResult::new(response.successful, response.failed, response.results.failed)
    }
}

/// Decodes a successful response body into a `BatchResult`.
pub fn parse_batch_response(body: &str) -> std::result::Result<BatchResult, TransportError> {
    serde_json::from_str::<BulkUploadResponse>(body)
        .map(BatchResult::from)
        .map_err(|e| TransportError::failed(format!("invalid response body: {}", e)))
}

/// Sends one batch per call. `HttpTransport` talks to the server and
/// `MockTransport` replays scripted outcomes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one batch.
    ///
    /// # Errors
    /// * `TransportError::PayloadTooLarge` - the server answered 413
    /// * `TransportError::Failed` - anything else: network, timeout, other status, bad body
    async fn send_batch(
        &self,
        request: &BatchRequest<'_>,
    ) -> std::result::Result<BatchResult, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send_batch(
        &self,
        request: &BatchRequest<'_>,
    ) -> std::result::Result<BatchResult, TransportError> {
        (**self).send_batch(request).await
    }
}

/// Builds the shared reqwest client used by the transport and the read API.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(client)
}

pub struct HttpTransport {
    endpoint: String,
    token: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            token: token.into(),
            timeout,
            client: build_http_client(timeout)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn describe_request_error(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs())
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            format!("request failed: {}", err)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_batch(
        &self,
        request: &BatchRequest<'_>,
    ) -> std::result::Result<BatchResult, TransportError> {
        verbose!("POST {} with {} images", self.endpoint, request.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::failed(self.describe_request_error(&e)))?;

        let status = response.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(TransportError::PayloadTooLarge);
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::failed(self.describe_request_error(&e)))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(TransportError::failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                snippet
            )));
        }

        parse_batch_response(&body)
    }
}

type Responder =
    Box<dyn Fn(&BatchRequest<'_>) -> std::result::Result<BatchResult, TransportError> + Send + Sync>;

/// Transport double for tests and benches.
///
/// Scripted outcomes are consumed first, in order; once the script is empty
/// the responder answers. Without a responder every item succeeds.
pub struct MockTransport {
    script: Mutex<VecDeque<std::result::Result<BatchResult, TransportError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<BatchResult, TransportError>>,
    {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::new()
        }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&BatchRequest<'_>) -> std::result::Result<BatchResult, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Answers 413 for any batch longer than `max_items`, success otherwise.
    pub fn rejecting_over(max_items: usize) -> Self {
        Self::with_responder(move |request| {
            if request.len() > max_items {
                Err(TransportError::PayloadTooLarge)
            } else {
                Ok(BatchResult::new(request.len(), 0, Vec::new()))
            }
        })
    }

    pub fn always_too_large() -> Self {
        Self::with_responder(|_| Err(TransportError::PayloadTooLarge))
    }

    /// Filenames of every attempted batch, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_batch(
        &self,
        request: &BatchRequest<'_>,
    ) -> std::result::Result<BatchResult, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.filenames());

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match (scripted, &self.responder) {
            (Some(outcome), _) => outcome,
            (None, Some(responder)) => responder(request),
            (None, None) => Ok(BatchResult::new(request.len(), 0, Vec::new())),
        }
    }
}
