//! Integration tests for running several project crawls together.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use review_crawler::testing::{numbered_changes, MockPageFetcher};
use review_crawler::{
    ChangeSet, CrawlError, CrawlRunner, CrawlerConfig, FetchError, IdentityReference, Page,
    PageFetcher, RetryPolicy, RunnerConfig,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Routes each project to its own scripted history.
#[derive(Default)]
struct ProjectFetchers {
    projects: HashMap<String, MockPageFetcher>,
    panicking: HashSet<String>,
}

impl ProjectFetchers {
    fn with(mut self, project: &str, fetcher: MockPageFetcher) -> Self {
        self.projects.insert(project.to_string(), fetcher);
        self
    }

    fn panicking(mut self, project: &str) -> Self {
        self.panicking.insert(project.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for ProjectFetchers {
    async fn fetch(
        &self,
        project: &str,
        start_offset: usize,
        page_size: usize,
    ) -> Result<Page, FetchError> {
        if self.panicking.contains(project) {
            panic!("fetcher for {} blew up", project);
        }
        match self.projects.get(project) {
            Some(fetcher) => fetcher.fetch(project, start_offset, page_size).await,
            None => Ok(Page::new(vec![])),
        }
    }
}

fn config(page_size: usize) -> CrawlerConfig {
    CrawlerConfig::new()
        .with_page_size(page_size)
        .with_retry(RetryPolicy::immediate(2))
}

fn runner_config(max_concurrent_projects: usize) -> RunnerConfig {
    RunnerConfig {
        max_concurrent_projects,
        changeset_capacity: 1024,
        identity_capacity: 1024,
    }
}

#[tokio::test]
async fn test_crawls_every_project() {
    let fetcher = ProjectFetchers::default()
        .with("alpha", MockPageFetcher::new(numbered_changes("alpha", 5)))
        .with("beta", MockPageFetcher::new(numbered_changes("beta", 3)));
    let (change_tx, mut change_rx) = mpsc::channel::<ChangeSet>(1024);
    let (identity_tx, _identity_rx) = mpsc::channel::<IdentityReference>(1024);

    let runner =
        CrawlRunner::new(fetcher, change_tx, identity_tx, config(2), &runner_config(2)).unwrap();
    let report = runner
        .run(
            vec!["beta".to_string(), "alpha".to_string(), "gamma".to_string()],
            &CancellationToken::new(),
        )
        .await;

    let projects: Vec<&str> = report.outcomes.iter().map(|o| o.project.as_str()).collect();
    assert_eq!(projects, vec!["alpha", "beta", "gamma"]);
    assert_eq!(report.succeeded().count(), 3);
    assert_eq!(report.change_sets_dispatched(), 8);
    assert_eq!(report.identities_dispatched(), 8);
    drop(runner);

    // Pages of one project stay in order even when projects interleave
    let mut alpha = Vec::new();
    while let Some(change) = change_rx.recv().await {
        if change.project() == "alpha" {
            alpha.push(change.number());
        }
    }
    assert_eq!(alpha, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_failing_project_does_not_stop_others() {
    let fetcher = ProjectFetchers::default()
        .with(
            "broken",
            MockPageFetcher::new(numbered_changes("broken", 4)).fail_at(0, 5),
        )
        .with("healthy", MockPageFetcher::new(numbered_changes("healthy", 4)));
    let (change_tx, _change_rx) = mpsc::channel::<ChangeSet>(1024);
    let (identity_tx, _identity_rx) = mpsc::channel::<IdentityReference>(1024);

    let runner =
        CrawlRunner::new(fetcher, change_tx, identity_tx, config(3), &runner_config(1)).unwrap();
    let report = runner
        .run(
            vec!["broken".to_string(), "healthy".to_string()],
            &CancellationToken::new(),
        )
        .await;

    let failed: Vec<(&str, &CrawlError)> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "broken");
    assert!(matches!(
        failed[0].1,
        CrawlError::ProjectCrawlFailed {
            offset: 0,
            attempts: 2,
            ..
        }
    ));
    assert_eq!(report.change_sets_dispatched(), 4);
}

#[tokio::test]
async fn test_panicked_project_is_reported_as_failed() {
    let fetcher = ProjectFetchers::default()
        .with("healthy", MockPageFetcher::new(numbered_changes("healthy", 2)))
        .panicking("doomed");
    let (change_tx, _change_rx) = mpsc::channel::<ChangeSet>(16);
    let (identity_tx, _identity_rx) = mpsc::channel::<IdentityReference>(16);

    let runner =
        CrawlRunner::new(fetcher, change_tx, identity_tx, config(5), &runner_config(2)).unwrap();
    let report = runner
        .run(
            vec!["doomed".to_string(), "healthy".to_string()],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.outcomes.len(), 2);
    let failed: Vec<(&str, &CrawlError)> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "doomed");
    assert!(matches!(
        failed[0].1,
        CrawlError::TaskFailed { project, .. } if project == "doomed"
    ));
    assert_eq!(report.succeeded().count(), 1);
}

#[tokio::test]
async fn test_cancelled_run_reports_every_project() {
    let fetcher = ProjectFetchers::default()
        .with("alpha", MockPageFetcher::new(numbered_changes("alpha", 5)));
    let (change_tx, _change_rx) = mpsc::channel::<ChangeSet>(16);
    let (identity_tx, _identity_rx) = mpsc::channel::<IdentityReference>(16);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let runner =
        CrawlRunner::new(fetcher, change_tx, identity_tx, config(2), &runner_config(1)).unwrap();
    let report = runner
        .run(vec!["alpha".to_string(), "beta".to_string()], &cancel)
        .await;

    assert_eq!(report.outcomes.len(), 2);
    assert!(report
        .failed()
        .all(|(_, e)| matches!(e, CrawlError::Cancelled { offset: 0, .. })));
    assert_eq!(report.change_sets_dispatched(), 0);
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let (change_tx, _change_rx) = mpsc::channel::<ChangeSet>(1);
    let (identity_tx, _identity_rx) = mpsc::channel::<IdentityReference>(1);

    let result = CrawlRunner::new(
        ProjectFetchers::default(),
        change_tx,
        identity_tx,
        config(2),
        &runner_config(0),
    );
    assert!(result.is_err());
}
