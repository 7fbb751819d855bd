//! The paged source seam: a windowed, offset-paged upstream API.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchResult;
use crate::window::RetrievalWindow;

/// One page of results from the upstream.
#[derive(Debug, Clone)]
pub struct Page {
    /// Raw response payload, appended verbatim to the output archive.
    pub payload: Bytes,
    /// Records contained in this page; advances the window offset.
    pub records: u32,
    /// Whether the upstream reports further data at a higher offset.
    pub more_available: bool,
}

/// A windowed, offset-paged upstream API.
#[async_trait]
pub trait PagedSource {
    /// Fetches one page of `window` starting at `offset`.
    async fn fetch(
        &self,
        window: &RetrievalWindow,
        offset: u64,
        page_size: u32,
    ) -> FetchResult<Page>;
}
