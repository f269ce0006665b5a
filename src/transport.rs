//! HTTP transport abstraction.
//!
//! The protocol layers describe the exchanges (URL, body, media types) and
//! leave the actual HTTP client to the application, so the crate works the
//! same under blocking clients, async wrappers or test doubles.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected content type {actual} from {url}")]
    ContentType { url: String, actual: String },
    #[error("transport failure: {0}")]
    Io(String),
}

/// Client used to reach OCSP responders, timestamp authorities and CA
/// certificate repositories.
pub trait Transport {
    /// POST `body` and return the response body. Implementations must
    /// report non-success statuses as [`TransportError::Status`] and a
    /// response content type other than `accept` as
    /// [`TransportError::ContentType`].
    fn send(
        &self,
        url: &str,
        body: &[u8],
        content_type: &str,
        accept: &str,
    ) -> Result<Vec<u8>, TransportError>;

    /// GET a resource, used to fetch issuer certificates named by
    /// authority-information-access URLs.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}
