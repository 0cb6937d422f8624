// Entry point for crawling a Gerrit server's review history

use anyhow::{Context, Result};
use gerrit_client::GerritClient;
use review_crawler::{
    ChangeSet, Config, CrawlRunner, GerritPageFetcher, IdentityReference,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,review_crawler=debug,gerrit_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(gerrit_url = %config.gerrit_url, "Configuration loaded");

    let mut client = GerritClient::with_timeout(&config.gerrit_url, config.request_timeout)
        .context("Failed to create Gerrit client")?;
    if let (Some(username), Some(password)) = (&config.gerrit_username, &config.gerrit_password) {
        client = client.with_credentials(username, password);
    }
    let fetcher = GerritPageFetcher::new(client, &config.crawler);

    let projects = if config.projects.is_empty() {
        tracing::info!("No projects configured, listing all projects");
        fetcher
            .projects()
            .await
            .context("Failed to list projects")?
            .into_iter()
            .map(|p| p.name)
            .collect()
    } else {
        config.projects.clone()
    };
    tracing::info!(count = projects.len(), "Projects to crawl");

    // Stand-ins for the storage and identity-resolution consumers
    let (change_tx, mut change_rx) = mpsc::channel::<ChangeSet>(config.runner.changeset_capacity);
    let (identity_tx, mut identity_rx) =
        mpsc::channel::<IdentityReference>(config.runner.identity_capacity);

    let change_consumer = tokio::spawn(async move {
        let mut received = 0usize;
        while let Some(change_set) = change_rx.recv().await {
            received += 1;
            tracing::trace!(project = %change_set.project(), change = change_set.number(), "Change set received");
        }
        received
    });
    let identity_consumer = tokio::spawn(async move {
        let mut received = 0usize;
        while let Some(identity) = identity_rx.recv().await {
            received += 1;
            tracing::trace!(account_id = ?identity.account_id(), "Identity received");
        }
        received
    });

    let runner = CrawlRunner::new(
        fetcher,
        change_tx,
        identity_tx,
        config.crawler.clone(),
        &config.runner,
    )
    .context("Invalid crawler configuration")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, cancelling crawls");
            shutdown.cancel();
        }
    });

    let report = runner.run(projects, &cancel).await;
    // Dropping the runner closes both channels so the consumers can finish
    drop(runner);

    let change_sets = change_consumer.await.context("Change set consumer failed")?;
    let identities = identity_consumer.await.context("Identity consumer failed")?;
    tracing::info!(change_sets, identities, "Consumers drained");

    let failed: Vec<&str> = report.failed().map(|(project, _)| project).collect();
    if !failed.is_empty() {
        anyhow::bail!("{} project(s) failed: {}", failed.len(), failed.join(", "));
    }

    Ok(())
}
