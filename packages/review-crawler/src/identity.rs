//! Unresolved references to people found inside change records.
//!
//! Each variant corresponds to one raw shape the server embeds in a change.
//! Nothing here resolves or deduplicates; a reference with no account id is
//! still a reference and is handed on as-is.

use gerrit_client::{AccountInfo, ApprovalInfo, GitPersonInfo};
use serde::{Deserialize, Serialize};

/// A reference to a person, pending resolution to a canonical identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityReference {
    /// Owner, label state slot, removable reviewer, message author or uploader.
    Account(AccountRef),
    /// An entry of a label's voter list.
    Approval(ApprovalRef),
    /// Author or committer recorded in git commit data.
    Person(PersonRef),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub account_id: Option<u64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRef {
    pub account: AccountRef,
    pub value: Option<i32>,
    pub granted_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub name: String,
    pub email: String,
    pub timestamp: String,
    pub tz_offset_minutes: i32,
}

impl IdentityReference {
    /// The account id, for the shapes that carry one.
    pub fn account_id(&self) -> Option<u64> {
        match self {
            IdentityReference::Account(account) => account.account_id,
            IdentityReference::Approval(approval) => approval.account.account_id,
            IdentityReference::Person(_) => None,
        }
    }

    /// Email address, if the raw shape included one.
    pub fn email(&self) -> Option<&str> {
        match self {
            IdentityReference::Account(account) => account.email.as_deref(),
            IdentityReference::Approval(approval) => approval.account.email.as_deref(),
            IdentityReference::Person(person) => Some(person.email.as_str()),
        }
    }
}

impl From<&AccountInfo> for AccountRef {
    fn from(info: &AccountInfo) -> Self {
        Self {
            account_id: info.account_id,
            name: info.name.clone(),
            email: info.email.clone(),
            username: info.username.clone(),
        }
    }
}

impl From<&ApprovalInfo> for ApprovalRef {
    fn from(info: &ApprovalInfo) -> Self {
        Self {
            account: AccountRef::from(&info.account),
            value: info.value,
            granted_at: info.date.clone(),
        }
    }
}

impl From<&GitPersonInfo> for PersonRef {
    fn from(info: &GitPersonInfo) -> Self {
        Self {
            name: info.name.clone(),
            email: info.email.clone(),
            timestamp: info.date.clone(),
            tz_offset_minutes: info.tz,
        }
    }
}

impl From<&AccountInfo> for IdentityReference {
    fn from(info: &AccountInfo) -> Self {
        IdentityReference::Account(info.into())
    }
}

impl From<&ApprovalInfo> for IdentityReference {
    fn from(info: &ApprovalInfo) -> Self {
        IdentityReference::Approval(info.into())
    }
}

impl From<&GitPersonInfo> for IdentityReference {
    fn from(info: &GitPersonInfo) -> Self {
        IdentityReference::Person(info.into())
    }
}
