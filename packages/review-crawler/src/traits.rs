use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{FetchError, SinkClosed};
use crate::types::Page;

// ============================================================================
// PAGE FETCHER: one paginated query against the review server
// ============================================================================

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page of `project`'s changes starting at `start_offset`.
    ///
    /// Records come back in server order. Implementations must not hang
    /// forever; the crawl loop has no timeout of its own.
    async fn fetch(
        &self,
        project: &str,
        start_offset: usize,
        page_size: usize,
    ) -> Result<Page, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(
        &self,
        project: &str,
        start_offset: usize,
        page_size: usize,
    ) -> Result<Page, FetchError> {
        (**self).fetch(project, start_offset, page_size).await
    }
}

// ============================================================================
// SINKS: handoff to storage and identity resolution
// ============================================================================

/// Accepts one produced record per call, waiting while the consumer is behind.
#[async_trait]
pub trait RecordSink<T: Send + 'static>: Send + Sync {
    async fn send(&self, item: T) -> Result<(), SinkClosed>;
}

#[async_trait]
impl<T: Send + 'static> RecordSink<T> for mpsc::Sender<T> {
    async fn send(&self, item: T) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, item).await.map_err(|_| SinkClosed)
    }
}
