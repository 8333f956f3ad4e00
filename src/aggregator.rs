use futures::future::join_all;
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{BannerError, Result};
use crate::github::RepositoryClient;
use crate::models::{Account, CommitRecord, RepoCommitMatch, RepoHandle};

/// Finds the tracked account's most recent commit across its repositories.
///
/// The repository set is captured once at startup and never changes
/// afterwards.
pub struct CommitAggregator {
    client: Arc<dyn RepositoryClient>,
    account: Account,
    tracked_repos: BTreeMap<u64, RepoHandle>,
}

impl CommitAggregator {
    pub fn new(client: Arc<dyn RepositoryClient>, account: Account, repos: Vec<RepoHandle>) -> Self {
        let tracked_repos = repos.into_iter().map(|repo| (repo.id, repo)).collect();
        Self {
            client,
            account,
            tracked_repos,
        }
    }

    /// Resolve the account and snapshot its repository listing
    pub async fn init(client: Arc<dyn RepositoryClient>, username: &str) -> Result<Self> {
        let account = client.get_account(username).await?;
        tracing::info!("Tracking commits of {} (id {})", account.login, account.id);

        let repos = client.list_repositories(&account).await?;
        tracing::info!("Loaded {} repositories for {}", repos.len(), account.login);

        Ok(Self::new(client, account, repos))
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn tracked_repos(&self) -> impl Iterator<Item = &RepoHandle> {
        self.tracked_repos.values()
    }

    /// First commit by the tracked account in the repository's newest-first
    /// history. Stops reading as soon as it matches.
    pub async fn find_latest_in_repo(&self, repo: &RepoHandle) -> Result<RepoCommitMatch> {
        let mut commits = self.client.commits_newest_first(repo);

        while let Some(commit) = commits.try_next().await? {
            if !commit.is_authored_by(&self.account) {
                continue;
            }

            let extra = CommitRecord::from_detail(&commit.commit)?;
            return Ok(RepoCommitMatch {
                commit,
                extra,
                repo: repo.clone(),
            });
        }

        Err(BannerError::CommitNotFound(format!(
            "unable to find `{}` commit in {}",
            self.account.login, repo.name
        )))
    }

    /// Scans every tracked repository concurrently and keeps the newest match.
    /// A failing repository is logged and left out.
    pub async fn find_latest_overall(&self) -> Result<RepoCommitMatch> {
        let scans = self.tracked_repos.values().map(|repo| async move {
            let result = self.find_latest_in_repo(repo).await;
            (repo, result)
        });

        let results = join_all(scans).await;
        let scanned = results.len();

        let latest = results
            .into_iter()
            .filter_map(|(repo, result)| match result {
                Ok(found) => Some(found),
                Err(e) => {
                    tracing::warn!(repo = %repo.name, "Skipping repository: {:?}", e);
                    None
                }
            })
            .max_by_key(|found| found.extra.date());

        match latest {
            Some(found) => {
                tracing::info!(
                    "Latest commit {} by {} <{}> in {} at {}",
                    found.commit.sha,
                    found.extra.name(),
                    found.extra.email(),
                    found.repo.name,
                    found.extra.date()
                );
                Ok(found)
            }
            None => Err(BannerError::CommitNotFound(format!(
                "no commit detected across {} repositories",
                scanned
            ))),
        }
    }
}
