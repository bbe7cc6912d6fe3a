use async_trait::async_trait;
use futures::StreamExt;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors produced by a [`Transport`] before any body parsing happens.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint actively refused the connection.
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),
    /// Network-level error other than a refused connection (DNS, TLS, reset, ...)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    /// Failure reported by a custom transport implementation.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, TransportError::ConnectionRefused(_))
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() && chain_has_refused(&err) {
            return TransportError::ConnectionRefused(err.to_string());
        }
        TransportError::Network(err)
    }
}

/// Walks the error source chain looking for an I/O `ConnectionRefused`.
fn chain_has_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        if e.to_string().to_lowercase().contains("connection refused") {
            return true;
        }
        current = e.source();
    }
    false
}

/// Status and text body of one completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single-shot retrieval of an endpoint.
///
/// Implementations perform exactly one attempt per call; the poll cadence is
/// the only retry policy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    max_body_size: usize,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: Self::DEFAULT_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Bounds the whole request, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    async fn fetch(&self, endpoint: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status().as_u16();
        let bytes = read_limited_bytes(response, self.max_body_size).await?;
        let body = String::from_utf8(bytes).map_err(|_| TransportError::InvalidUtf8)?;

        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str) -> Result<TransportResponse, TransportError> {
        tokio::time::timeout(self.timeout, self.fetch(endpoint))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::from_reqwest)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
