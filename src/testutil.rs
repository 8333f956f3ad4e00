//! In-memory fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::Barrier;

use crate::error::{BannerError, Result};
use crate::github::RepositoryClient;
use crate::models::{Account, CommitAuthorDetail, CommitDetail, CommitHandle, RepoHandle, RepoOwner};

pub const TRACKED_ID: u64 = 42;
pub const OTHER_ID: u64 = 7;

pub fn account() -> Account {
    Account {
        id: TRACKED_ID,
        login: "stella".into(),
    }
}

pub fn repo(id: u64, name: &str) -> RepoHandle {
    RepoHandle {
        id,
        name: name.into(),
        owner: RepoOwner { login: "stella".into() },
    }
}

pub fn commit(sha: &str, author_id: u64, date: DateTime<Utc>) -> CommitHandle {
    CommitHandle {
        sha: sha.into(),
        author: Some(Account {
            id: author_id,
            login: format!("user{}", author_id),
        }),
        commit: CommitDetail {
            author: CommitAuthorDetail {
                name: "Stella".into(),
                email: "stella@example.com".into(),
                date: date.format(crate::models::COMMIT_DATE_FORMAT).to_string(),
            },
            message: format!("commit {}", sha),
        },
    }
}

pub enum History {
    Commits(Vec<CommitHandle>),
    /// Panics if polled past the listed commits
    Guarded(Vec<CommitHandle>),
    /// Yields nothing until every history sharing the barrier is being read
    Rendezvous(Arc<Barrier>, Vec<CommitHandle>),
    Fail,
}

/// Fake source host with a fixed set of repositories.
pub struct FakeClient {
    repos: Vec<RepoHandle>,
    histories: HashMap<u64, History>,
    fail_listing: bool,
    history_calls: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            repos: Vec::new(),
            histories: HashMap::new(),
            fail_listing: false,
            history_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_repo(mut self, repo: RepoHandle, history: History) -> Self {
        self.histories.insert(repo.id, history);
        self.repos.push(repo);
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn repos(&self) -> Vec<RepoHandle> {
        self.repos.clone()
    }

    /// Number of commit histories requested so far
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryClient for FakeClient {
    async fn get_account(&self, username: &str) -> Result<Account> {
        Ok(Account {
            id: TRACKED_ID,
            login: username.into(),
        })
    }

    async fn list_repositories(&self, _account: &Account) -> Result<Vec<RepoHandle>> {
        if self.fail_listing {
            return Err(BannerError::Malformed("listing unavailable".into()));
        }
        Ok(self.repos.clone())
    }

    fn commits_newest_first<'a>(&'a self, repo: &'a RepoHandle) -> BoxStream<'a, Result<CommitHandle>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);

        match self.histories.get(&repo.id) {
            Some(History::Commits(commits)) => {
                stream::iter(commits.clone().into_iter().map(Ok::<_, BannerError>)).boxed()
            }
            Some(History::Guarded(commits)) => stream::iter(commits.clone().into_iter().map(Ok::<_, BannerError>))
                .chain(stream::poll_fn(|_| -> Poll<Option<Result<CommitHandle>>> {
                    panic!("history over-consumed")
                }))
                .boxed(),
            Some(History::Rendezvous(barrier, commits)) => {
                let barrier = Arc::clone(barrier);
                let commits = commits.clone();
                stream::once(async move {
                    barrier.wait().await;
                    stream::iter(commits.into_iter().map(Ok::<_, BannerError>))
                })
                .flatten()
                .boxed()
            }
            Some(History::Fail) | None => stream::once(async {
                Err(BannerError::UpstreamStatus {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: "upstream down".into(),
                })
            })
            .boxed(),
        }
    }
}
