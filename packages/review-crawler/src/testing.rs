//! Testing utilities including mock implementations.
//!
//! These are useful for exercising crawl loops without a review server.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use gerrit_client::{AccountInfo, ChangeInfo, GerritError};

use crate::error::FetchError;
use crate::traits::PageFetcher;
use crate::types::Page;

/// Record of a call made to the mock fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub project: String,
    pub start_offset: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Transport,
    EmptyResult,
}

/// A page fetcher serving a fixed, in-memory change history.
///
/// Faults can be scripted per offset: each scripted fault is consumed by one
/// fetch of that offset, after which the offset succeeds.
#[derive(Default)]
pub struct MockPageFetcher {
    changes: Vec<ChangeInfo>,
    faults: Mutex<HashMap<usize, Vec<Fault>>>,
    report_more_flag: bool,
    calls: Mutex<Vec<FetchCall>>,
}

impl MockPageFetcher {
    pub fn new(changes: Vec<ChangeInfo>) -> Self {
        Self {
            changes,
            ..Default::default()
        }
    }

    /// Fail the next `times` fetches of `offset` with a transport error.
    pub fn fail_at(self, offset: usize, times: usize) -> Self {
        self.push_faults(offset, Fault::Transport, times)
    }

    /// Answer the next `times` fetches of `offset` with no payload.
    pub fn empty_result_at(self, offset: usize, times: usize) -> Self {
        self.push_faults(offset, Fault::EmptyResult, times)
    }

    /// Report the server continuation flag on every page.
    pub fn with_more_flag(mut self) -> Self {
        self.report_more_flag = true;
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Offsets requested, in call order.
    pub fn offsets(&self) -> Vec<usize> {
        self.calls().iter().map(|c| c.start_offset).collect()
    }

    fn push_faults(self, offset: usize, fault: Fault, times: usize) -> Self {
        self.faults
            .lock()
            .unwrap()
            .entry(offset)
            .or_default()
            .extend(std::iter::repeat(fault).take(times));
        self
    }

    fn take_fault(&self, offset: usize) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap();
        let pending = faults.get_mut(&offset)?;
        if pending.is_empty() {
            return None;
        }
        Some(pending.remove(0))
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(
        &self,
        project: &str,
        start_offset: usize,
        page_size: usize,
    ) -> Result<Page, FetchError> {
        self.calls.lock().unwrap().push(FetchCall {
            project: project.to_string(),
            start_offset,
            page_size,
        });

        match self.take_fault(start_offset) {
            Some(Fault::Transport) => {
                return Err(FetchError::Transport {
                    project: project.to_string(),
                    offset: start_offset,
                    source: GerritError::Api {
                        status: 503,
                        message: "Service Unavailable".to_string(),
                    },
                })
            }
            Some(Fault::EmptyResult) => {
                return Err(FetchError::EmptyResult {
                    project: project.to_string(),
                    offset: start_offset,
                })
            }
            None => {}
        }

        let start = start_offset.min(self.changes.len());
        let end = start_offset.saturating_add(page_size).min(self.changes.len());
        let page = Page::new(self.changes[start..end].to_vec());

        if self.report_more_flag {
            Ok(page.with_has_more(end < self.changes.len()))
        } else {
            Ok(page)
        }
    }
}

/// `count` changes of `project`, numbered from 1, each owned by the account
/// with the same number.
pub fn numbered_changes(project: &str, count: usize) -> Vec<ChangeInfo> {
    (1..=count as u64)
        .map(|number| ChangeInfo {
            project: project.to_string(),
            number,
            owner: Some(AccountInfo {
                account_id: Some(number),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}
