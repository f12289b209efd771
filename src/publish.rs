use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::github::{
    FileUpdate, GitHubError, NewPullRequest, PullRequest, PullRequestRef, ReadmeSnapshot,
    RepositoryService,
};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not resolve head of {base}: {source}")]
    BaseBranch {
        base: String,
        #[source]
        source: GitHubError,
    },

    #[error("could not create branch {branch}: {source}")]
    Branch {
        branch: String,
        #[source]
        source: GitHubError,
    },

    #[error("{path} changed since it was read (expected blob {expected})")]
    Conflict { path: String, expected: String },

    #[error("could not commit {path} to {branch}: {source}")]
    Commit {
        path: String,
        branch: String,
        #[source]
        source: GitHubError,
    },

    #[error("could not open pull request from {branch}: {source}")]
    PullRequest {
        branch: String,
        #[source]
        source: GitHubError,
    },
}

/// Where the proposal ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub branch: String,
    pub commit: String,
    pub pull_request: PullRequestRef,
}

/// `<prefix>/pr-<number>-<YYYYMMDDHHMMSS>` in UTC.
pub fn branch_name(prefix: &str, pr_number: u64, at: DateTime<Utc>) -> String {
    format!("{prefix}/pr-{pr_number}-{}", at.format("%Y%m%d%H%M%S"))
}

pub fn pull_request_title(source: &PullRequest) -> String {
    format!("docs: update README for #{} ({})", source.number, source.title)
}

pub fn pull_request_body(source: &PullRequest, readme_path: &str) -> String {
    format!(
        "Proposed update to `{readme_path}` reflecting the changes in #{number} ({url}).\n\n\
         The new text was generated from that pull request's diffs and commit messages. \
         Review it before merging.\n",
        number = source.number,
        url = source.html_url,
    )
}

/// A branch this run created. Deleted again unless `keep` is called.
struct CreatedBranch<'a> {
    repo: &'a dyn RepositoryService,
    name: String,
    settled: bool,
}

impl<'a> CreatedBranch<'a> {
    fn keep(mut self) -> String {
        self.settled = true;
        std::mem::take(&mut self.name)
    }

    /// Best effort: a failed delete is logged and never replaces the original error.
    async fn rollback(mut self) {
        self.settled = true;
        match self.repo.delete_branch(&self.name).await {
            Ok(()) => info!(branch = %self.name, "deleted branch after failed publish"),
            Err(err) => warn!(branch = %self.name, error = %err, "could not delete branch after failed publish"),
        }
    }
}

impl Drop for CreatedBranch<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(branch = %self.name, "branch left behind by an interrupted publish");
        }
    }
}

/// Opens the README proposal as a branch + commit + pull request.
pub struct Publisher<'a> {
    repo: &'a dyn RepositoryService,
    branch_prefix: String,
}

impl<'a> Publisher<'a> {
    pub fn new(repo: &'a dyn RepositoryService, branch_prefix: impl Into<String>) -> Self {
        Self {
            repo,
            branch_prefix: branch_prefix.into(),
        }
    }

    /// Create a branch from `base`, write `content` over the README guarded by
    /// the snapshot's version, and open a PR back into `base`.
    ///
    /// If anything fails after the branch exists, the branch is deleted before
    /// the error is returned.
    #[instrument(skip_all, fields(pr = source.number, base = %base))]
    pub async fn publish(
        &self,
        source: &PullRequest,
        readme: &ReadmeSnapshot,
        base: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<PublishResult, PublishError> {
        let head = self
            .repo
            .branch_head(base)
            .await
            .map_err(|err| PublishError::BaseBranch {
                base: base.to_string(),
                source: err,
            })?;

        let name = branch_name(&self.branch_prefix, source.number, at);
        let branch = self.create_branch(&name, &head).await?;

        let outcome = self
            .commit_and_open(source, readme, base, content, &branch.name)
            .await;
        match outcome {
            Ok((commit, pull_request)) => {
                let branch = branch.keep();
                info!(branch = %branch, pr = pull_request.number, "published README proposal");
                Ok(PublishResult {
                    branch,
                    commit,
                    pull_request,
                })
            }
            Err(err) => {
                branch.rollback().await;
                Err(err)
            }
        }
    }

    async fn create_branch(
        &self,
        name: &str,
        from_sha: &str,
    ) -> Result<CreatedBranch<'a>, PublishError> {
        self.repo
            .create_branch(name, from_sha)
            .await
            .map_err(|err| PublishError::Branch {
                branch: name.to_string(),
                source: err,
            })?;
        info!(branch = %name, from = %from_sha, "created branch");
        Ok(CreatedBranch {
            repo: self.repo,
            name: name.to_string(),
            settled: false,
        })
    }

    async fn commit_and_open(
        &self,
        source: &PullRequest,
        readme: &ReadmeSnapshot,
        base: &str,
        content: &str,
        branch: &str,
    ) -> Result<(String, PullRequestRef), PublishError> {
        let update = FileUpdate {
            path: readme.path.clone(),
            content: content.to_string(),
            version: readme.version.clone(),
            branch: branch.to_string(),
            message: format!("docs: update {} for #{}", readme.path, source.number),
        };
        let commit = self.repo.update_file(&update).await.map_err(|err| match err {
            GitHubError::Conflict { path, expected } => PublishError::Conflict { path, expected },
            err => PublishError::Commit {
                path: readme.path.clone(),
                branch: branch.to_string(),
                source: err,
            },
        })?;

        let request = NewPullRequest {
            title: pull_request_title(source),
            body: pull_request_body(source, &readme.path),
            head: branch.to_string(),
            base: base.to_string(),
        };
        let pull_request = self
            .repo
            .create_pull_request(&request)
            .await
            .map_err(|err| PublishError::PullRequest {
                branch: branch.to_string(),
                source: err,
            })?;

        Ok((commit, pull_request))
    }
}
