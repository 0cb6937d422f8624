//! Pure Gerrit REST API client.
//!
//! A minimal client for the parts of the Gerrit REST API the review crawler
//! needs: paginated change queries and project listing.
//!
//! # Example
//!
//! ```rust,ignore
//! use gerrit_client::{GerritClient, QueryChangeOptions};
//!
//! let client = GerritClient::new("https://review.example.org")?;
//! let opts = QueryChangeOptions::new("project:demo").with_limit(50);
//! let changes = client.query_changes(&opts).await?.unwrap_or_default();
//! for change in &changes {
//!     println!("{} {}", change.number, change.subject);
//! }
//! ```

pub mod error;
mod lenient;
pub mod types;

pub use error::{GerritError, Result};
pub use types::{
    AccountInfo, ApprovalInfo, ChangeInfo, ChangeMessageInfo, CommitInfo, GitPersonInfo,
    LabelInfo, ProjectInfo, QueryChangeOptions, RevisionInfo,
};

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

/// Prefix Gerrit puts in front of every JSON body to defeat XSSI.
const XSSI_PREFIX: &str = ")]}'";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: String,
}

pub struct GerritClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl GerritClient {
    /// Create an anonymous client with the default request timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create an anonymous client whose requests fail after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            credentials: None,
        })
    }

    /// Use HTTP basic auth against the `/a/` endpoints.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Run a change query. `None` means the server answered with an empty
    /// (`null`) payload rather than a list.
    pub async fn query_changes(&self, opts: &QueryChangeOptions) -> Result<Option<Vec<ChangeInfo>>> {
        let url = self.endpoint("changes/")?;
        let pairs = opts.to_query_pairs();
        tracing::debug!(url = %url, query = ?opts.query, start = ?opts.start, limit = ?opts.limit, "Querying changes");
        self.get_json(url, &pairs).await
    }

    /// List all projects visible to the caller, keyed by project name.
    pub async fn list_projects(&self) -> Result<BTreeMap<String, ProjectInfo>> {
        let url = self.endpoint("projects/")?;
        let projects: Option<BTreeMap<String, ProjectInfo>> = self.get_json(url, &[]).await?;
        Ok(projects.unwrap_or_default())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let path = match self.credentials {
            Some(_) => format!("a/{}", path),
            None => path.to_string(),
        };
        Ok(self.base_url.join(&path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GerritError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        decode_body(&body)
    }
}

/// Decode a Gerrit JSON body, dropping the XSSI guard line if present.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(strip_xssi_prefix(body))?)
}

fn strip_xssi_prefix(body: &str) -> &str {
    body.trim_start()
        .strip_prefix(XSSI_PREFIX)
        .unwrap_or(body)
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_body_strips_xssi_prefix() {
        let body = ")]}'\n[{\"_number\": 7, \"project\": \"demo\"}]";
        let changes: Option<Vec<ChangeInfo>> = decode_body(body).unwrap();
        let changes = changes.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].number, 7);
        assert_eq!(changes[0].project, "demo");
    }

    #[test]
    fn test_decode_body_without_prefix() {
        let changes: Option<Vec<ChangeInfo>> = decode_body("[]").unwrap();
        assert_eq!(changes, Some(vec![]));
    }

    #[test]
    fn test_decode_null_payload() {
        let changes: Option<Vec<ChangeInfo>> = decode_body(")]}'\nnull").unwrap();
        assert!(changes.is_none());
    }

    #[test]
    fn test_malformed_record_does_not_reject_its_page() {
        let body = r#")]}'
[{"_number": 1, "owner": {"_account_id": 1}},
 {"_number": 2, "owner": {"_account_id": "not-a-number"}, "_more_changes": true}]"#;

        let changes: Option<Vec<ChangeInfo>> = decode_body(body).unwrap();
        let changes = changes.unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].owner.as_ref().unwrap().account_id, Some(1));
        assert_eq!(changes[1].number, 2);
        assert_eq!(changes[1].owner.as_ref().unwrap().account_id, None);
        assert_eq!(changes[1].more_changes, Some(true));
    }

    #[test]
    fn test_decode_invalid_json_is_parse_error() {
        let err = decode_body::<Vec<ChangeInfo>>(")]}'\n<html>").unwrap_err();
        assert!(matches!(err, GerritError::Parse(_)));
    }

    #[test]
    fn test_endpoint_uses_auth_prefix_with_credentials() {
        let anonymous = GerritClient::new("https://review.example.org/gerrit").unwrap();
        assert_eq!(
            anonymous.endpoint("changes/").unwrap().as_str(),
            "https://review.example.org/gerrit/changes/"
        );

        let authed = anonymous.with_credentials("bot", "secret");
        assert_eq!(
            authed.endpoint("changes/").unwrap().as_str(),
            "https://review.example.org/gerrit/a/changes/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = GerritClient::new("not a url").err().unwrap();
        assert!(matches!(err, GerritError::InvalidUrl(_)));
    }

    #[test]
    fn test_query_pairs() {
        let opts = QueryChangeOptions::new("project:demo")
            .with_limit(25)
            .with_start(50)
            .with_additional_fields(["LABELS", "MESSAGES"]);

        assert_eq!(
            opts.to_query_pairs(),
            vec![
                ("q", "project:demo".to_string()),
                ("n", "25".to_string()),
                ("S", "50".to_string()),
                ("o", "LABELS".to_string()),
                ("o", "MESSAGES".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_join_terms_with_space() {
        let mut opts = QueryChangeOptions::new("project:demo");
        opts.query.push("status:merged".to_string());
        assert_eq!(opts.to_query_pairs(), vec![("q", "project:demo status:merged".to_string())]);
    }
}
