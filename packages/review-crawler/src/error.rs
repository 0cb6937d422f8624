//! Typed errors for the review crawler.

use gerrit_client::GerritError;
use thiserror::Error;

/// A single page request failed. Always retryable at the same offset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport or protocol failure from the query client
    #[error("fetching {project} at offset {offset} failed: {source}")]
    Transport {
        project: String,
        offset: usize,
        #[source]
        source: GerritError,
    },

    /// The server answered without error but returned no payload
    #[error("empty result for {project} at offset {offset}")]
    EmptyResult { project: String, offset: usize },
}

/// Which output a send was attempted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    ChangeSet,
    Identity,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::ChangeSet => write!(f, "change set sink"),
            SinkKind::Identity => write!(f, "identity sink"),
        }
    }
}

/// The receiving side of a sink has gone away.
#[derive(Debug, Error)]
#[error("sink closed")]
pub struct SinkClosed;

/// Terminal outcomes of a project crawl other than completing normally.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Retry budget exhausted on one offset
    #[error("crawl of {project} failed at offset {offset} after {attempts} attempts: {source}")]
    ProjectCrawlFailed {
        project: String,
        offset: usize,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    /// A downstream consumer stopped receiving
    #[error("{sink} closed while crawling {project}")]
    SinkClosed { project: String, sink: SinkKind },

    /// The crawl was cancelled before reaching the end of history
    #[error("crawl of {project} cancelled at offset {offset}")]
    Cancelled { project: String, offset: usize },

    /// The task crawling the project panicked or was aborted
    #[error("crawl task for {project} failed: {reason}")]
    TaskFailed { project: String, reason: String },
}

/// Invalid crawler settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("page size must be at least 1")]
    ZeroPageSize,

    #[error("at least one label must be configured")]
    NoLabels,

    #[error("required query field {0} is missing")]
    MissingField(&'static str),

    #[error("retry policy must allow at least one attempt")]
    ZeroAttempts,

    #[error("channel capacity must be at least 1")]
    ZeroCapacity,
}

pub type CrawlResult<T> = std::result::Result<T, CrawlError>;
