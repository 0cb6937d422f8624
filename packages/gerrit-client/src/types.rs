use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::lenient;

/// Options for `GET /changes/`.
#[derive(Debug, Clone, Default)]
pub struct QueryChangeOptions {
    /// Query terms, AND-ed together (e.g. `project:foo`).
    pub query: Vec<String>,
    /// `n=` page size.
    pub limit: Option<usize>,
    /// `S=` number of changes to skip.
    pub start: Option<usize>,
    /// `o=` options requesting additional fields.
    pub additional_fields: Vec<String>,
}

impl QueryChangeOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: vec![query.into()],
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_additional_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Query-string pairs in the order Gerrit documents them.
    pub(crate) fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3 + self.additional_fields.len());
        if !self.query.is_empty() {
            pairs.push(("q", self.query.join(" ")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("n", limit.to_string()));
        }
        if let Some(start) = self.start {
            pairs.push(("S", start.to_string()));
        }
        for field in &self.additional_fields {
            pairs.push(("o", field.clone()));
        }
        pairs
    }
}

// Every model below decodes its sub-fields through `lenient`, and keeps fields
// it does not model in `extra`, so a change re-serializes as the server sent it.

/// A Gerrit account as embedded in changes (`AccountInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(
        rename = "_account_id",
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub account_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A vote on a label (`ApprovalInfo`): the voter's account plus the vote.
///
/// Unmodelled approval fields (`tag`, `permitted_voting_range`) land in the
/// flattened account's `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalInfo {
    #[serde(flatten)]
    pub account: AccountInfo,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// State of one label on a change (`LabelInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub approved: Option<AccountInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub rejected: Option<AccountInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub recommended: Option<AccountInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub disliked: Option<AccountInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<i32>,
    #[serde(default, deserialize_with = "lenient::vec", skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<ApprovalInfo>,
    #[serde(default, deserialize_with = "lenient::map", skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A review message (`ChangeMessageInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessageInfo {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub author: Option<AccountInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub message: String,
    #[serde(
        rename = "_revision_number",
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub revision_number: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Author or committer of a git commit (`GitPersonInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitPersonInfo {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub tz: i32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A git commit (`CommitInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, deserialize_with = "lenient::vec", skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<CommitInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub author: Option<GitPersonInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub committer: Option<GitPersonInfo>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One patch set of a change (`RevisionInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "_number", default, deserialize_with = "lenient::or_default")]
    pub number: u32,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub uploader: Option<AccountInfo>,
    #[serde(
        rename = "ref",
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub git_ref: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
    /// `files`, `fetch`, `actions`, `commit_with_footers` and the like.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A change as returned by the query endpoint (`ChangeInfo`).
///
/// Map-valued fields keep the server's key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeInfo {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub project: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub branch: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub change_id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(rename = "_number", default, deserialize_with = "lenient::or_default")]
    pub number: u64,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub owner: Option<AccountInfo>,
    #[serde(default, deserialize_with = "lenient::map", skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, LabelInfo>,
    #[serde(default, deserialize_with = "lenient::vec", skip_serializing_if = "Vec::is_empty")]
    pub removable_reviewers: Vec<AccountInfo>,
    #[serde(default, deserialize_with = "lenient::vec", skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ChangeMessageInfo>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub current_revision: Option<String>,
    #[serde(default, deserialize_with = "lenient::map", skip_serializing_if = "IndexMap::is_empty")]
    pub revisions: IndexMap<String, RevisionInfo>,
    /// Only set on the last change of a page, and only when more results exist.
    #[serde(
        rename = "_more_changes",
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub more_changes: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Project metadata from `GET /projects/` (`ProjectInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}
