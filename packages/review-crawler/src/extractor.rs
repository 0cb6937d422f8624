//! Identity extraction from change records.
//!
//! Traversal order per change:
//!
//! 1. owner
//! 2. for each configured label, in order: approved, rejected, recommended,
//!    disliked, then every entry of the label's `all` list
//! 3. removable reviewers
//! 4. message authors
//! 5. revision uploaders (followed by commit author and committer when
//!    commit persons are enabled)
//!
//! Absent slots produce nothing. Present slots are always emitted, even when
//! the account inside is empty; deduplication belongs to the resolver.

use gerrit_client::{ChangeInfo, LabelInfo};

use crate::config::CrawlerConfig;
use crate::identity::IdentityReference;
use crate::types::ChangeSet;

/// Walks change records and collects every embedded identity reference.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    labels: Vec<String>,
    include_commit_persons: bool,
}

impl RecordExtractor {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            include_commit_persons: false,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.labels.iter().cloned()).with_commit_persons(config.include_commit_persons)
    }

    pub fn with_commit_persons(mut self, include: bool) -> Self {
        self.include_commit_persons = include;
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Split a record into the change set to store and its identity references.
    pub fn extract(&self, change: ChangeInfo) -> (ChangeSet, Vec<IdentityReference>) {
        let identities = self.identities(&change);
        (ChangeSet::new(change), identities)
    }

    /// Identity references of a change, in traversal order.
    pub fn identities(&self, change: &ChangeInfo) -> Vec<IdentityReference> {
        let mut out: Vec<IdentityReference> = Vec::new();

        if let Some(owner) = &change.owner {
            out.push(owner.into());
        }

        for name in &self.labels {
            if let Some(label) = change.labels.get(name) {
                push_label(&mut out, label);
            }
        }

        out.extend(change.removable_reviewers.iter().map(IdentityReference::from));

        out.extend(
            change
                .messages
                .iter()
                .filter_map(|m| m.author.as_ref())
                .map(IdentityReference::from),
        );

        for revision in change.revisions.values() {
            if let Some(uploader) = &revision.uploader {
                out.push(uploader.into());
            }
            if self.include_commit_persons {
                if let Some(commit) = &revision.commit {
                    out.extend(commit.author.iter().map(IdentityReference::from));
                    out.extend(commit.committer.iter().map(IdentityReference::from));
                }
            }
        }

        out
    }
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

fn push_label(out: &mut Vec<IdentityReference>, label: &LabelInfo) {
    let slots = [&label.approved, &label.rejected, &label.recommended, &label.disliked];
    out.extend(slots.into_iter().flatten().map(IdentityReference::from));
    out.extend(label.all.iter().map(IdentityReference::from));
}
