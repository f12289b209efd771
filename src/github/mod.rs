pub mod client;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use client::GitHubClient;
pub use types::{
    FileChange, FileUpdate, NewPullRequest, PullRequest, PullRequestRef, ReadmeSnapshot, RepoPath,
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{path} was modified since it was read (expected blob {expected})")]
    Conflict { path: String, expected: String },

    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected GitHub response: {0}")]
    Decode(String),
}

/// Operations the pipeline needs from the repository host.
/// Every call targets the single repository the service was built for.
#[async_trait]
pub trait RepositoryService: Send + Sync {
    async fn default_branch(&self) -> Result<String, GitHubError>;

    /// Read a file at `git_ref` together with its blob SHA.
    async fn readme(&self, path: &str, git_ref: &str) -> Result<ReadmeSnapshot, GitHubError>;

    async fn pull_request(&self, number: u64) -> Result<PullRequest, GitHubError>;

    /// Changed files in PR order.
    async fn pull_request_files(&self, number: u64) -> Result<Vec<FileChange>, GitHubError>;

    /// Commit messages in PR order.
    async fn pull_request_commits(&self, number: u64) -> Result<Vec<String>, GitHubError>;

    /// SHA of the commit `branch` points at.
    async fn branch_head(&self, branch: &str) -> Result<String, GitHubError>;

    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), GitHubError>;

    async fn delete_branch(&self, name: &str) -> Result<(), GitHubError>;

    /// Write a file on a branch. Fails with `GitHubError::Conflict` when
    /// `update.version` no longer matches the file's current blob SHA.
    /// Returns the SHA of the new commit.
    async fn update_file(&self, update: &FileUpdate) -> Result<String, GitHubError>;

    async fn create_pull_request(&self, pr: &NewPullRequest)
        -> Result<PullRequestRef, GitHubError>;
}
