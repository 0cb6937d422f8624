//! Per-project crawl loop.
//!
//! ```text
//! FETCHING ──ok, records──► DISPATCHING ──more──► FETCHING
//!    │  ▲                        │
//!    │  └──error (same offset)   └──last page──► DONE
//!    └──ok, empty────────────────────────────► DONE
//! ```
//!
//! The loop never advances past a page that failed to fetch, and never issues
//! the next request before every record of the current page has been handed
//! to the sinks.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use gerrit_client::ChangeInfo;

use crate::config::CrawlerConfig;
use crate::error::{ConfigError, CrawlError, CrawlResult, SinkKind};
use crate::extractor::RecordExtractor;
use crate::identity::IdentityReference;
use crate::traits::{PageFetcher, RecordSink};
use crate::types::{ChangeSet, CrawlSummary, PaginationCursor};

/// Crawls the change history of one project at a time.
pub struct CrawlLoop<F, C, I> {
    fetcher: F,
    change_sets: C,
    identities: I,
    extractor: RecordExtractor,
    config: CrawlerConfig,
}

impl<F, C, I> CrawlLoop<F, C, I>
where
    F: PageFetcher,
    C: RecordSink<ChangeSet>,
    I: RecordSink<IdentityReference>,
{
    pub fn new(
        fetcher: F,
        change_sets: C,
        identities: I,
        config: CrawlerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            change_sets,
            identities,
            extractor: RecordExtractor::from_config(&config),
            config,
        })
    }

    /// Crawl `project` from offset 0 until the end of its history.
    pub async fn run(&self, project: &str, cancel: &CancellationToken) -> CrawlResult<CrawlSummary> {
        let mut cursor = PaginationCursor::new(self.config.page_size);
        let mut failures: u32 = 0;
        let mut summary = CrawlSummary {
            project: project.to_string(),
            crawl_session_id: Uuid::new_v4(),
            pages_fetched: 0,
            failed_attempts: 0,
            change_sets_dispatched: 0,
            identities_dispatched: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        info!(
            project = %project,
            crawl_session_id = %summary.crawl_session_id,
            page_size = cursor.page_size,
            "Starting project crawl"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(project, &cursor));
            }

            let start = cursor.start_offset;
            info!(
                project = %project,
                start,
                end = start + cursor.page_size,
                "Querying for changes"
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(project, &cursor)),
                result = self.fetcher.fetch(project, start, cursor.page_size) => result,
            };

            let page = match result {
                Ok(page) => {
                    failures = 0;
                    page
                }
                Err(e) => {
                    failures += 1;
                    summary.failed_attempts += 1;

                    if failures >= self.config.retry.max_attempts {
                        error!(
                            project = %project,
                            offset = start,
                            attempts = failures,
                            error = %e,
                            "Giving up on project"
                        );
                        return Err(CrawlError::ProjectCrawlFailed {
                            project: project.to_string(),
                            offset: start,
                            attempts: failures,
                            source: e,
                        });
                    }

                    let delay = self.config.retry.backoff_for(failures);
                    warn!(
                        project = %project,
                        offset = start,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying same offset"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(project, &cursor)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            summary.pages_fetched += 1;
            let count = page.len();
            let more = cursor.expects_more(count, page.has_more);
            info!(project = %project, count, "Received changes to process");

            self.dispatch(project, page.records, &mut summary, &cursor, cancel)
                .await?;

            if !more {
                break;
            }
            cursor.advance(count);
        }

        summary.finished_at = Utc::now();
        info!(
            project = %project,
            crawl_session_id = %summary.crawl_session_id,
            pages = summary.pages_fetched,
            change_sets = summary.change_sets_dispatched,
            identities = summary.identities_dispatched,
            failed_attempts = summary.failed_attempts,
            "Project crawl completed"
        );

        Ok(summary)
    }

    /// Hand every record of a page to the sinks, in page order.
    async fn dispatch(
        &self,
        project: &str,
        records: Vec<ChangeInfo>,
        summary: &mut CrawlSummary,
        cursor: &PaginationCursor,
        cancel: &CancellationToken,
    ) -> CrawlResult<()> {
        for record in records {
            let (change_set, identities) = self.extractor.extract(record);
            debug!(
                project = %project,
                change = change_set.number(),
                identities = identities.len(),
                "Dispatching change"
            );

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(project, cursor)),
                sent = self.change_sets.send(change_set) => sent,
            };
            sent.map_err(|_| sink_closed(project, SinkKind::ChangeSet))?;
            summary.change_sets_dispatched += 1;

            for identity in identities {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled(project, cursor)),
                    sent = self.identities.send(identity) => sent,
                };
                sent.map_err(|_| sink_closed(project, SinkKind::Identity))?;
                summary.identities_dispatched += 1;
            }
        }
        Ok(())
    }
}

fn cancelled(project: &str, cursor: &PaginationCursor) -> CrawlError {
    info!(project = %project, offset = cursor.start_offset, "Project crawl cancelled");
    CrawlError::Cancelled {
        project: project.to_string(),
        offset: cursor.start_offset,
    }
}

fn sink_closed(project: &str, sink: SinkKind) -> CrawlError {
    error!(project = %project, sink = %sink, "Sink closed, stopping project crawl");
    CrawlError::SinkClosed {
        project: project.to_string(),
        sink,
    }
}
