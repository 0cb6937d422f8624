use chrono::{DateTime, Utc};
use gerrit_client::{ChangeInfo, ProjectInfo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fetched change, forwarded to storage as the server returned it.
///
/// Malformed sub-fields were already dropped while decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    change: ChangeInfo,
}

impl ChangeSet {
    pub fn new(change: ChangeInfo) -> Self {
        Self { change }
    }

    pub fn change(&self) -> &ChangeInfo {
        &self.change
    }

    pub fn project(&self) -> &str {
        &self.change.project
    }

    pub fn number(&self) -> u64 {
        self.change.number
    }
}

/// A crawl target as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub info: ProjectInfo,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<ChangeInfo>,
    /// Server-reported continuation flag, when the server sent one
    pub has_more: Option<bool>,
}

impl Page {
    pub fn new(records: Vec<ChangeInfo>) -> Self {
        Self {
            records,
            has_more: None,
        }
    }

    pub fn with_has_more(mut self, has_more: bool) -> Self {
        self.has_more = Some(has_more);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Per-project pagination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    pub start_offset: usize,
    pub page_size: usize,
}

impl PaginationCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            start_offset: 0,
            page_size,
        }
    }

    /// Move past the records a page actually returned.
    pub fn advance(&mut self, returned: usize) {
        self.start_offset += returned;
    }

    /// Whether a page of `returned` records, with the server's optional
    /// continuation flag, leaves more history to fetch.
    pub fn expects_more(&self, returned: usize, has_more: Option<bool>) -> bool {
        if returned == 0 {
            return false;
        }
        match has_more {
            Some(flag) => flag,
            None => returned >= self.page_size,
        }
    }
}

/// Outcome of one completed project crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub project: String,
    pub crawl_session_id: Uuid,
    pub pages_fetched: usize,
    pub failed_attempts: usize,
    pub change_sets_dispatched: usize,
    pub identities_dispatched: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advances_by_returned_count() {
        let mut cursor = PaginationCursor::new(10);
        cursor.advance(10);
        cursor.advance(3);
        assert_eq!(cursor.start_offset, 13);
        assert_eq!(cursor.page_size, 10);
    }

    #[test]
    fn test_empty_page_never_expects_more() {
        let cursor = PaginationCursor::new(10);
        assert!(!cursor.expects_more(0, None));
        assert!(!cursor.expects_more(0, Some(true)));
    }

    #[test]
    fn test_size_heuristic_without_flag() {
        let cursor = PaginationCursor::new(10);
        assert!(cursor.expects_more(10, None));
        assert!(!cursor.expects_more(9, None));
    }

    #[test]
    fn test_server_flag_wins_over_heuristic() {
        let cursor = PaginationCursor::new(10);
        assert!(!cursor.expects_more(10, Some(false)));
        assert!(cursor.expects_more(4, Some(true)));
    }

    #[test]
    fn test_change_set_serializes_as_the_change() {
        let change = ChangeInfo {
            project: "demo".to_string(),
            number: 12,
            ..Default::default()
        };
        let change_set = ChangeSet::new(change.clone());
        assert_eq!(
            serde_json::to_value(&change_set).unwrap(),
            serde_json::to_value(&change).unwrap()
        );
        assert_eq!(change_set.project(), "demo");
        assert_eq!(change_set.number(), 12);
    }
}
