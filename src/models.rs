use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BannerError, Result};

/// Wire format of commit author dates
pub const COMMIT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The tracked account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

/// Repository handle, only the fields the banner reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoHandle {
    pub id: u64,
    pub name: String,
    pub owner: RepoOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthorDetail {
    pub name: String,
    pub email: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub author: CommitAuthorDetail,
    pub message: String,
}

/// Commit handle as listed by the upstream. `author` is the linked account,
/// absent when the commit email maps to no account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitHandle {
    pub sha: String,
    pub author: Option<Account>,
    pub commit: CommitDetail,
}

impl CommitHandle {
    pub fn is_authored_by(&self, account: &Account) -> bool {
        self.author.as_ref().is_some_and(|a| a.id == account.id)
    }
}

/// Normalized commit metadata. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    name: String,
    email: String,
    date: DateTime<Utc>,
    message: String,
}

impl CommitRecord {
    pub fn new(name: String, email: String, date: DateTime<Utc>, message: String) -> Self {
        Self {
            name,
            email,
            date,
            message,
        }
    }

    pub fn from_detail(detail: &CommitDetail) -> Result<Self> {
        let date = parse_commit_date(&detail.author.date)?;
        Ok(Self::new(
            detail.author.name.clone(),
            detail.author.email.clone(),
            date,
            detail.message.clone(),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn parse_commit_date(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, COMMIT_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| BannerError::Malformed(format!("commit date {:?}: {}", raw, e)))
}

/// A repository's latest qualifying commit. `extra.date` orders matches.
#[derive(Debug, Clone)]
pub struct RepoCommitMatch {
    pub commit: CommitHandle,
    pub extra: CommitRecord,
    pub repo: RepoHandle,
}
