use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{BannerError, Result};
use crate::models::{Account, CommitHandle, RepoHandle};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_PER_PAGE: usize = 100;

/// Read access to the source host.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    async fn get_account(&self, username: &str) -> Result<Account>;

    /// Every repository of the account, all pages drained.
    async fn list_repositories(&self, account: &Account) -> Result<Vec<RepoHandle>>;

    /// Commit history in the host's own reverse-chronological order. Pages are
    /// fetched lazily as the stream is polled.
    fn commits_newest_first<'a>(&'a self, repo: &'a RepoHandle) -> BoxStream<'a, Result<CommitHandle>>;
}

pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    per_page: usize,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            per_page: DEFAULT_PER_PAGE,
        })
    }

    #[cfg(test)]
    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("GET {} {:?}", url, query);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BannerError::UpstreamStatus { status, body });
        }

        Ok(resp.json::<T>().await?)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, path: &str, page: u32) -> Result<Vec<T>> {
        let query = [("per_page", self.per_page.to_string()), ("page", page.to_string())];
        self.get_json(path, &query).await
    }

    /// Lazily walks a paged listing; a short page ends it.
    fn paged<'a, T>(&'a self, path: String) -> BoxStream<'a, Result<T>>
    where
        T: DeserializeOwned + Send + 'a,
    {
        stream::try_unfold(Some(1u32), move |page| {
            let path = path.clone();
            async move {
                let Some(page) = page else {
                    return Ok::<_, BannerError>(None);
                };

                let items: Vec<T> = self.fetch_page(&path, page).await?;
                let next = (items.len() >= self.per_page).then_some(page + 1);
                Ok(Some((stream::iter(items.into_iter().map(Ok::<T, BannerError>)), next)))
            }
        })
        .try_flatten()
        .boxed()
    }
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    async fn get_account(&self, username: &str) -> Result<Account> {
        self.get_json(&format!("users/{}", username), &[]).await
    }

    async fn list_repositories(&self, account: &Account) -> Result<Vec<RepoHandle>> {
        self.paged(format!("users/{}/repos", account.login))
            .try_collect()
            .await
    }

    fn commits_newest_first<'a>(&'a self, repo: &'a RepoHandle) -> BoxStream<'a, Result<CommitHandle>> {
        self.paged(format!("repos/{}/{}/commits", repo.owner.login, repo.name))
    }
}
