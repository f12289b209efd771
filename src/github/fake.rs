//! In-memory `RepositoryService` that records every call, for pipeline tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::types::{
    FileChange, FileUpdate, NewPullRequest, PullRequest, PullRequestRef, ReadmeSnapshot,
};
use super::{GitHubError, RepositoryService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DefaultBranch,
    Readme(String),
    PullRequest(u64),
    PullRequestFiles(u64),
    PullRequestCommits(u64),
    BranchHead(String),
    CreateBranch { name: String, from_sha: String },
    DeleteBranch(String),
    UpdateFile(FileUpdate),
    CreatePullRequest(NewPullRequest),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateBranch { .. }
                | Call::DeleteBranch(_)
                | Call::UpdateFile(_)
                | Call::CreatePullRequest(_)
        )
    }
}

pub struct FakeRepository {
    pub default_branch: String,
    pub head_sha: String,
    pub readme: ReadmeSnapshot,
    /// Blob SHA the remote README currently has; writes with another version conflict.
    pub remote_version: String,
    pub pr: PullRequest,
    pub files: Vec<FileChange>,
    pub commits: Vec<String>,
    pub missing_readme: bool,
    pub fail_create_branch: bool,
    pub fail_create_pr: bool,
    pub fail_delete_branch: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeRepository {
    /// PR #7 touching README.md with one commit, README "# Title\n".
    pub fn scenario() -> Self {
        Self {
            default_branch: "main".to_string(),
            head_sha: "head0001".to_string(),
            readme: ReadmeSnapshot {
                path: "README.md".to_string(),
                content: "# Title\n".to_string(),
                version: "blob0001".to_string(),
            },
            remote_version: "blob0001".to_string(),
            pr: PullRequest {
                number: 7,
                title: "Add widget export".to_string(),
                html_url: "https://github.com/octo/widgets/pull/7".to_string(),
            },
            files: vec![FileChange {
                filename: "README.md".to_string(),
                patch: Some("+added section".to_string()),
            }],
            commits: vec!["docs: update".to_string()],
            missing_readme: false,
            fail_create_branch: false,
            fail_create_pr: false,
            fail_delete_branch: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RepositoryService for FakeRepository {
    async fn default_branch(&self) -> Result<String, GitHubError> {
        self.record(Call::DefaultBranch);
        Ok(self.default_branch.clone())
    }

    async fn readme(&self, path: &str, git_ref: &str) -> Result<ReadmeSnapshot, GitHubError> {
        self.record(Call::Readme(path.to_string()));
        if self.missing_readme || path != self.readme.path || git_ref != self.default_branch {
            return Err(GitHubError::NotFound(format!("file {path}")));
        }
        Ok(self.readme.clone())
    }

    async fn pull_request(&self, number: u64) -> Result<PullRequest, GitHubError> {
        self.record(Call::PullRequest(number));
        if number != self.pr.number {
            return Err(GitHubError::NotFound(format!("pull request #{number}")));
        }
        Ok(self.pr.clone())
    }

    async fn pull_request_files(&self, number: u64) -> Result<Vec<FileChange>, GitHubError> {
        self.record(Call::PullRequestFiles(number));
        Ok(self.files.clone())
    }

    async fn pull_request_commits(&self, number: u64) -> Result<Vec<String>, GitHubError> {
        self.record(Call::PullRequestCommits(number));
        Ok(self.commits.clone())
    }

    async fn branch_head(&self, branch: &str) -> Result<String, GitHubError> {
        self.record(Call::BranchHead(branch.to_string()));
        if branch != self.default_branch {
            return Err(GitHubError::NotFound(format!("branch {branch}")));
        }
        Ok(self.head_sha.clone())
    }

    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), GitHubError> {
        self.record(Call::CreateBranch {
            name: name.to_string(),
            from_sha: from_sha.to_string(),
        });
        if self.fail_create_branch {
            return Err(GitHubError::Api {
                status: 422,
                message: "Reference already exists".to_string(),
            });
        }
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), GitHubError> {
        self.record(Call::DeleteBranch(name.to_string()));
        if self.fail_delete_branch {
            return Err(GitHubError::Api {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        Ok(())
    }

    async fn update_file(&self, update: &FileUpdate) -> Result<String, GitHubError> {
        self.record(Call::UpdateFile(update.clone()));
        if update.version != self.remote_version {
            return Err(GitHubError::Conflict {
                path: update.path.clone(),
                expected: update.version.clone(),
            });
        }
        Ok("commit0002".to_string())
    }

    async fn create_pull_request(
        &self,
        pr: &NewPullRequest,
    ) -> Result<PullRequestRef, GitHubError> {
        self.record(Call::CreatePullRequest(pr.clone()));
        if self.fail_create_pr {
            return Err(GitHubError::Api {
                status: 403,
                message: "Resource not accessible by integration".to_string(),
            });
        }
        Ok(PullRequestRef {
            number: 8,
            html_url: "https://github.com/octo/widgets/pull/8".to_string(),
        })
    }
}
