//! Runs one crawl loop per project as independent tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{CrawlerConfig, RunnerConfig};
use crate::crawler::CrawlLoop;
use crate::error::{ConfigError, CrawlError, CrawlResult};
use crate::identity::IdentityReference;
use crate::traits::{PageFetcher, RecordSink};
use crate::types::{ChangeSet, CrawlSummary};

/// Result of crawling one project.
#[derive(Debug)]
pub struct ProjectOutcome {
    pub project: String,
    pub result: CrawlResult<CrawlSummary>,
}

/// Per-project outcomes of a run, ordered by project name.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub outcomes: Vec<ProjectOutcome>,
}

impl CrawlReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &CrawlSummary> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &CrawlError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.project.as_str(), e)))
    }

    pub fn change_sets_dispatched(&self) -> usize {
        self.succeeded().map(|s| s.change_sets_dispatched).sum()
    }

    pub fn identities_dispatched(&self) -> usize {
        self.succeeded().map(|s| s.identities_dispatched).sum()
    }
}

/// Crawls many projects concurrently, each strictly sequentially.
///
/// Projects share the fetcher and the sinks but nothing mutable.
pub struct CrawlRunner<F, C, I> {
    crawl: Arc<CrawlLoop<F, C, I>>,
    limits: Arc<Semaphore>,
}

impl<F, C, I> CrawlRunner<F, C, I>
where
    F: PageFetcher + 'static,
    C: RecordSink<ChangeSet> + 'static,
    I: RecordSink<IdentityReference> + 'static,
{
    pub fn new(
        fetcher: F,
        change_sets: C,
        identities: I,
        config: CrawlerConfig,
        runner: &RunnerConfig,
    ) -> Result<Self, ConfigError> {
        runner.validate()?;
        let crawl = CrawlLoop::new(fetcher, change_sets, identities, config)?;
        Ok(Self {
            crawl: Arc::new(crawl),
            limits: Arc::new(Semaphore::new(runner.max_concurrent_projects)),
        })
    }

    /// Crawl every project to completion, failure or cancellation.
    ///
    /// A failing project never stops the others.
    pub async fn run(&self, projects: Vec<String>, cancel: &CancellationToken) -> CrawlReport {
        info!(projects = projects.len(), "Starting crawl run");

        let mut tasks = JoinSet::new();
        let mut task_projects = HashMap::new();
        for project in projects {
            let crawl = self.crawl.clone();
            let limits = self.limits.clone();
            let cancel = cancel.child_token();

            let task_project = project.clone();
            let handle = tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = limits.acquire_owned() => permit.ok(),
                };
                let result = match permit {
                    Some(_permit) => crawl.run(&project, &cancel).await,
                    None => Err(CrawlError::Cancelled {
                        project: project.clone(),
                        offset: 0,
                    }),
                };
                ProjectOutcome { project, result }
            });
            task_projects.insert(handle.id(), task_project);
        }

        let mut report = CrawlReport::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => {
                    match &outcome.result {
                        Ok(summary) => info!(
                            project = %outcome.project,
                            change_sets = summary.change_sets_dispatched,
                            identities = summary.identities_dispatched,
                            "Project finished"
                        ),
                        Err(e @ CrawlError::Cancelled { .. }) => {
                            warn!(project = %outcome.project, error = %e, "Project cancelled")
                        }
                        Err(e) => error!(project = %outcome.project, error = %e, "Project failed"),
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    let project = task_projects.remove(&e.id()).unwrap_or_default();
                    error!(project = %project, error = %e, "Project task failed");
                    report.outcomes.push(ProjectOutcome {
                        result: Err(CrawlError::TaskFailed {
                            project: project.clone(),
                            reason: e.to_string(),
                        }),
                        project,
                    });
                }
            }
        }

        report.outcomes.sort_by(|a, b| a.project.cmp(&b.project));
        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            change_sets = report.change_sets_dispatched(),
            identities = report.identities_dispatched(),
            "Crawl run finished"
        );
        report
    }
}
