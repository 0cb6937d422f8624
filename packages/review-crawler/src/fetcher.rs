//! Gerrit-backed page fetcher.

use async_trait::async_trait;
use gerrit_client::{ChangeInfo, GerritClient, GerritError, QueryChangeOptions};
use tracing::debug;

use crate::config::CrawlerConfig;
use crate::error::FetchError;
use crate::traits::PageFetcher;
use crate::types::{Page, Project};

/// Fetches pages of a project's changes through the Gerrit query endpoint.
///
/// Requests are bounded by the client's request timeout.
pub struct GerritPageFetcher {
    client: GerritClient,
    additional_fields: Vec<String>,
}

impl GerritPageFetcher {
    pub fn new(client: GerritClient, config: &CrawlerConfig) -> Self {
        Self {
            client,
            additional_fields: config.additional_fields.clone(),
        }
    }

    /// Every project visible to the crawler, ordered by name.
    pub async fn projects(&self) -> Result<Vec<Project>, GerritError> {
        let projects = self.client.list_projects().await?;
        debug!(count = projects.len(), "Listed projects");
        Ok(projects
            .into_iter()
            .map(|(name, info)| Project { name, info })
            .collect())
    }

    fn options(&self, project: &str, start_offset: usize, page_size: usize) -> QueryChangeOptions {
        QueryChangeOptions::new(format!("project:{}", project))
            .with_start(start_offset)
            .with_limit(page_size)
            .with_additional_fields(self.additional_fields.iter().cloned())
    }
}

#[async_trait]
impl PageFetcher for GerritPageFetcher {
    async fn fetch(
        &self,
        project: &str,
        start_offset: usize,
        page_size: usize,
    ) -> Result<Page, FetchError> {
        let opts = self.options(project, start_offset, page_size);

        let changes = self
            .client
            .query_changes(&opts)
            .await
            .map_err(|source| FetchError::Transport {
                project: project.to_string(),
                offset: start_offset,
                source,
            })?
            .ok_or_else(|| FetchError::EmptyResult {
                project: project.to_string(),
                offset: start_offset,
            })?;

        debug!(project = %project, offset = start_offset, count = changes.len(), "Fetched page");
        Ok(page_from_changes(changes))
    }
}

/// Gerrit marks only the last change of a page with `_more_changes`.
fn page_from_changes(changes: Vec<ChangeInfo>) -> Page {
    let has_more = changes.last().and_then(|c| c.more_changes);
    Page {
        records: changes,
        has_more,
    }
}
