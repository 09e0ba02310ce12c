//! Photo list API client

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::models::PhotoRecord;

use super::{FetchError, HttpResponse, HttpTransport, PageSource, TransportError};

/// Paginated client for `{base_url}/v2/list`
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl FetchClient {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the list URL for a page
    pub fn page_url(&self, page: u32, limit: u32) -> Result<String, FetchError> {
        if page == 0 || limit == 0 {
            return Err(FetchError::BadUrl);
        }

        let url = format!("{}/v2/list?page={page}&limit={limit}", self.base_url);
        let parsed = Url::parse(&url).map_err(|_| FetchError::BadUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(FetchError::BadUrl);
        }

        Ok(url)
    }
}

#[async_trait]
impl PageSource for FetchClient {
    async fn fetch_page(
        &self,
        page: u32,
        limit: u32,
        max_retries: u32,
    ) -> Result<Vec<PhotoRecord>, FetchError> {
        let url = self.page_url(page, limit)?;
        let attempts = max_retries.saturating_add(1);
        let mut last_error = TransportError::Other("no attempt made".to_string());

        for attempt in 1..=attempts {
            tracing::debug!(page, limit, attempt, "Fetching photo page");

            match self.transport.get(&url).await {
                Ok(response) => return decode_page(&response),
                Err(err) => {
                    tracing::warn!(page, attempt, attempts, error = %err, "Page fetch failed");
                    last_error = err;
                }
            }
        }

        Err(last_error.into())
    }
}

fn decode_page(response: &HttpResponse) -> Result<Vec<PhotoRecord>, FetchError> {
    if !response.is_success() {
        return Err(FetchError::InvalidStatusCode(response.status));
    }

    let photos: Vec<PicsumPhoto> = serde_json::from_slice(&response.body).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse photo page");
        FetchError::DecodingError
    })?;

    Ok(photos.into_iter().map(PicsumPhoto::into_record).collect())
}

/// Photo as returned by the list endpoint
#[derive(Debug, Deserialize)]
struct PicsumPhoto {
    id: String,
    author: String,
    width: i64,
    height: i64,
    url: String,
    download_url: String,
}

impl PicsumPhoto {
    fn into_record(self) -> PhotoRecord {
        PhotoRecord {
            id: self.id,
            author: self.author,
            width: clamp_dimension(self.width),
            height: clamp_dimension(self.height),
            listing_url: self.url,
            download_url: self.download_url,
        }
    }
}

fn clamp_dimension(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
