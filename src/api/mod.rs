//! HTTP plumbing and the photo list API client

pub mod http;
pub mod picsum;

pub use http::ReqwestTransport;
pub use picsum::FetchClient;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::PhotoRecord;

/// Classified failure of a page fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request URL could not be built
    #[error("bad URL")]
    BadUrl,
    /// Server answered with a non-2xx status
    #[error("invalid status code {0}")]
    InvalidStatusCode(u16),
    /// Response body was not a valid photo list
    #[error("failed to decode response")]
    DecodingError,
    /// No connectivity to the server
    #[error("no internet connection")]
    NoInternet,
    /// The request timed out
    #[error("request timed out")]
    Timeout,
    /// Anything else
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Whether this error belongs to the transport class that gets retried
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NoInternet | Self::Timeout | Self::Unknown(_))
    }
}

/// Transport-level failure (no HTTP response was received)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection or read timed out
    #[error("timed out")]
    Timeout,
    /// Could not connect to the host
    #[error("connection failed: {0}")]
    Connect(String),
    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Connect(_) => Self::NoInternet,
            TransportError::Other(msg) => Self::Unknown(msg),
        }
    }
}

/// A received HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Full body
    pub body: Bytes,
}

impl HttpResponse {
    /// Whether the status is 2xx
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Issues GET requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url` and read the whole body
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Source of photo list pages
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page of records, retrying transport failures up to `max_retries` times
    async fn fetch_page(
        &self,
        page: u32,
        limit: u32,
        max_retries: u32,
    ) -> Result<Vec<PhotoRecord>, FetchError>;
}
