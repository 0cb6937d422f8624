use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;

use crate::error::ConfigError;

/// Labels whose voters are extracted, in traversal order.
pub const DEFAULT_LABELS: [&str; 2] = ["CodeReview", "Verified"];

/// Extra change fields requested with every query.
pub const DEFAULT_ADDITIONAL_FIELDS: [&str; 15] = [
    "DETAILED_ACCOUNTS",
    "LABELS",
    "WEB_LINKS",
    "ALL_FILES",
    "MESSAGES",
    "CHANGE_ACTIONS",
    "REVIEWED",
    "COMMIT_FOOTERS",
    "ALL_REVISIONS",
    "DOWNLOAD_COMMANDS",
    "CURRENT_COMMIT",
    "ALL_COMMITS",
    "CURRENT_FILES",
    "CURRENT_REVISION",
    "DETAILED_LABELS",
];

/// Fields the extractor reads; a query without them yields silently empty identities.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "DETAILED_ACCOUNTS",
    "DETAILED_LABELS",
    "MESSAGES",
    "ALL_REVISIONS",
    "ALL_COMMITS",
];

/// Bounded exponential backoff applied to failed fetches of one offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per offset before the project is given up on
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, up to `max_attempts` times.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before retrying after the `failures`-th consecutive failure (1-based).
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Settings for one project crawl loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerConfig {
    pub page_size: usize,
    pub labels: Vec<String>,
    pub additional_fields: Vec<String>,
    /// Also emit commit author and committer for every revision
    pub include_commit_persons: bool,
    pub retry: RetryPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            additional_fields: DEFAULT_ADDITIONAL_FIELDS.iter().map(|f| f.to_string()).collect(),
            include_commit_persons: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_additional_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for field in fields.into_iter().map(Into::into) {
            if !deduped.contains(&field) {
                deduped.push(field);
            }
        }
        self.additional_fields = deduped;
        self
    }

    pub fn with_commit_persons(mut self, include: bool) -> Self {
        self.include_commit_persons = include;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.labels.is_empty() {
            return Err(ConfigError::NoLabels);
        }
        if let Some(missing) = REQUIRED_FIELDS
            .iter()
            .find(|f| !self.additional_fields.iter().any(|a| a.as_str() == **f))
        {
            return Err(ConfigError::MissingField(*missing));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

/// Settings for running many project crawls side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub max_concurrent_projects: usize,
    /// Change sets buffered before producers wait
    pub changeset_capacity: usize,
    /// Identity references buffered before producers wait
    pub identity_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_projects: 4,
            changeset_capacity: 256,
            identity_capacity: 4096,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_projects == 0
            || self.changeset_capacity == 0
            || self.identity_capacity == 0
        {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub gerrit_url: String,
    pub gerrit_username: Option<String>,
    pub gerrit_password: Option<String>,
    /// Projects to crawl; empty means every project the server lists
    pub projects: Vec<String>,
    pub request_timeout: Duration,
    pub crawler: CrawlerConfig,
    pub runner: RunnerConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gerrit_username = var("GERRIT_USERNAME").filter(|v| !v.is_empty());
        let gerrit_password = var("GERRIT_PASSWORD").filter(|v| !v.is_empty());
        if gerrit_username.is_some() != gerrit_password.is_some() {
            bail!("GERRIT_USERNAME and GERRIT_PASSWORD must be set together");
        }

        let mut crawler = CrawlerConfig::default()
            .with_page_size(parse_or(&var, "CRAWLER_PAGE_SIZE", 100)?)
            .with_commit_persons(parse_or(&var, "CRAWLER_INCLUDE_COMMIT_PERSONS", false)?)
            .with_retry(
                RetryPolicy::default().with_max_attempts(parse_or(&var, "CRAWLER_MAX_ATTEMPTS", 5)?),
            );
        if let Some(labels) = var("CRAWLER_LABELS") {
            crawler = crawler.with_labels(split_list(&labels));
        }
        crawler.validate().context("Invalid crawler configuration")?;

        let runner = RunnerConfig {
            max_concurrent_projects: parse_or(&var, "CRAWLER_MAX_CONCURRENT_PROJECTS", 4)?,
            changeset_capacity: parse_or(&var, "CRAWLER_CHANGESET_CAPACITY", 256)?,
            identity_capacity: parse_or(&var, "CRAWLER_IDENTITY_CAPACITY", 4096)?,
        };
        runner.validate().context("Invalid runner configuration")?;

        Ok(Self {
            gerrit_url: var("GERRIT_URL").context("GERRIT_URL must be set")?,
            gerrit_username,
            gerrit_password,
            projects: var("CRAWLER_PROJECTS")
                .map(|p| split_list(&p))
                .unwrap_or_default(),
            request_timeout: Duration::from_secs(parse_or(&var, "CRAWLER_REQUEST_TIMEOUT_SECS", 30)?),
            crawler,
            runner,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid {}", key, std::any::type_name::<T>())),
        None => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(CrawlerConfig::default().validate(), Ok(()));
        assert_eq!(RunnerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_default_fields_have_no_duplicates() {
        let config = CrawlerConfig::default();
        let deduped = config.clone().with_additional_fields(config.additional_fields.clone());
        assert_eq!(deduped.additional_fields, config.additional_fields);
    }

    #[test]
    fn test_with_additional_fields_dedupes_preserving_order() {
        let config = CrawlerConfig::new().with_additional_fields(["LABELS", "WEB_LINKS", "LABELS"]);
        assert_eq!(config.additional_fields, vec!["LABELS", "WEB_LINKS"]);
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = CrawlerConfig::new().with_page_size(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroPageSize));
    }

    #[test]
    fn test_validate_rejects_missing_required_field() {
        let config = CrawlerConfig::new().with_additional_fields(["LABELS", "MESSAGES"]);
        assert_eq!(config.validate(), Err(ConfigError::MissingField("DETAILED_ACCOUNTS")));
    }

    #[test]
    fn test_validate_rejects_empty_labels() {
        let config = CrawlerConfig::new().with_labels(Vec::<String>::new());
        assert_eq!(config.validate(), Err(ConfigError::NoLabels));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            multiplier: 2,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff_for(1), Duration::ZERO);
        assert_eq!(policy.backoff_for(3), Duration::ZERO);
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(lookup(&[("GERRIT_URL", "https://review.example.org")])).unwrap();
        assert_eq!(config.gerrit_url, "https://review.example.org");
        assert!(config.projects.is_empty());
        assert_eq!(config.crawler, CrawlerConfig::default());
        assert_eq!(config.runner, RunnerConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = Config::from_vars(lookup(&[
            ("GERRIT_URL", "https://review.example.org"),
            ("GERRIT_USERNAME", "bot"),
            ("GERRIT_PASSWORD", "secret"),
            ("CRAWLER_PROJECTS", "demo, tools/infra ,"),
            ("CRAWLER_PAGE_SIZE", "25"),
            ("CRAWLER_LABELS", "Code-Review,Verified,QA"),
            ("CRAWLER_INCLUDE_COMMIT_PERSONS", "true"),
            ("CRAWLER_MAX_ATTEMPTS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.projects, vec!["demo", "tools/infra"]);
        assert_eq!(config.crawler.page_size, 25);
        assert_eq!(config.crawler.labels, vec!["Code-Review", "Verified", "QA"]);
        assert!(config.crawler.include_commit_persons);
        assert_eq!(config.crawler.retry.max_attempts, 2);
        assert_eq!(config.gerrit_username.as_deref(), Some("bot"));
    }

    #[test]
    fn test_from_vars_requires_url() {
        assert!(Config::from_vars(lookup(&[])).is_err());
    }

    #[test]
    fn test_from_vars_rejects_half_credentials() {
        let result = Config::from_vars(lookup(&[
            ("GERRIT_URL", "https://review.example.org"),
            ("GERRIT_USERNAME", "bot"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_vars_rejects_bad_number() {
        let result = Config::from_vars(lookup(&[
            ("GERRIT_URL", "https://review.example.org"),
            ("CRAWLER_PAGE_SIZE", "lots"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_vars_rejects_zero_page_size() {
        let result = Config::from_vars(lookup(&[
            ("GERRIT_URL", "https://review.example.org"),
            ("CRAWLER_PAGE_SIZE", "0"),
        ]));
        assert!(result.is_err());
    }
}
