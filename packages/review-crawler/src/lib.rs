//! Review-history crawler.
//!
//! Pages through a Gerrit server's change history one project at a time and
//! streams each change, plus every identity reference found inside it, to
//! two bounded sinks.
//!
//! ```text
//! CrawlRunner ─► CrawlLoop (per project) ─► PageFetcher ─► RecordExtractor
//!                                                             │
//!                                      ChangeSet sink ◄───────┤
//!                                      Identity sink  ◄───────┘
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod identity;
pub mod runner;
pub mod testing;
pub mod traits;
pub mod types;

pub use config::{Config, CrawlerConfig, RetryPolicy, RunnerConfig};
pub use crawler::CrawlLoop;
pub use error::{ConfigError, CrawlError, CrawlResult, FetchError, SinkClosed, SinkKind};
pub use extractor::RecordExtractor;
pub use fetcher::GerritPageFetcher;
pub use identity::{AccountRef, ApprovalRef, IdentityReference, PersonRef};
pub use runner::{CrawlReport, CrawlRunner, ProjectOutcome};
pub use traits::{PageFetcher, RecordSink};
pub use types::{ChangeSet, CrawlSummary, Page, PaginationCursor, Project};
