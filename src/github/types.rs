use std::fmt;

/// `owner/name` identifier of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPath {
    pub owner: String,
    pub name: String,
}

impl RepoPath {
    /// Parse `owner/name`. Both parts must be non-empty; no further `/` allowed.
    pub fn parse(raw: &str) -> Option<RepoPath> {
        let (owner, name) = raw.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(RepoPath {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The source pull request whose changes the README should reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
}

/// A single file touched by the pull request, in the order GitHub lists them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub filename: String,
    /// Unified diff text. GitHub omits it for binary, rename-only and very large files.
    pub patch: Option<String>,
}

/// README content plus the blob SHA it was read at.
/// The SHA is the precondition for the later write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadmeSnapshot {
    pub path: String,
    pub content: String,
    pub version: String,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// A pull request created by this tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub html_url: String,
}

/// A file write on a branch, guarded by the blob SHA it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: String,
    pub content: String,
    pub version: String,
    pub branch: String,
    pub message: String,
}
