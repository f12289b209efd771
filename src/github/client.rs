use async_trait::async_trait;
use base64::prelude::*;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::types::{
    FileChange, FileUpdate, NewPullRequest, PullRequest, PullRequestRef, ReadmeSnapshot, RepoPath,
};
use super::{GitHubError, RepositoryService};

const USER_AGENT: &str = "readme-updater";
const PER_PAGE: u32 = 100;

/// GitHub REST v3 implementation of `RepositoryService`.
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    repo: RepoPath,
    token: String,
}

#[derive(Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    sha: String,
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    html_url: String,
}

#[derive(Deserialize)]
struct FileResponse {
    filename: String,
    patch: Option<String>,
}

#[derive(Deserialize)]
struct CommitEntry {
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    message: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

#[derive(Serialize)]
struct UpdateContentRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Deserialize)]
struct UpdateContentResponse {
    commit: RefObject,
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Deserialize)]
struct CreatedPullResponse {
    number: u64,
    html_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, repo: RepoPath, token: String) -> Result<Self, GitHubError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| GitHubError::Decode(format!("invalid API URL {api_url:?}: {e}")))?;
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_url,
            repo,
            token,
        })
    }

    /// Build `<api>/repos/{owner}/{name}/<parts...>`.
    /// Parts may contain `/`; each piece is percent-encoded as its own segment.
    fn url(&self, parts: &[&str]) -> Result<Url, GitHubError> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GitHubError::Decode(format!("API URL {} cannot be a base", self.api_url)))?;
            segments
                .pop_if_empty()
                .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()]);
            for part in parts {
                segments.extend(part.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        resource: &str,
    ) -> Result<T, GitHubError> {
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = check_status(response, resource).await?;
        decode(response).await
    }

    /// Fetch every page of a list endpoint.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        parts: &[&str],
        resource: &str,
    ) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let url = self.url(parts)?;
            let response = self
                .authorized(self.client.get(url))
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?;
            let response = check_status(response, resource).await?;
            let batch: Vec<T> = decode(response).await?;
            let len = batch.len();
            items.extend(batch);
            debug!(page, received = len, "fetched page");
            if len < PER_PAGE as usize {
                return Ok(items);
            }
            page += 1;
        }
    }
}

/// Map non-success statuses to `GitHubError`, keeping GitHub's `message` when present.
async fn check_status(response: Response, resource: &str) -> Result<Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(GitHubError::NotFound(resource.to_string()));
    }
    Err(GitHubError::Api {
        status: status.as_u16(),
        message: error_message(response).await,
    })
}

async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GitHubError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| GitHubError::Decode(e.to_string()))
}

/// GitHub wraps base64 content at 60 columns; strip the line breaks before decoding.
fn decode_content(content: &str) -> Result<String, GitHubError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(compact)
        .map_err(|e| GitHubError::Decode(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes).map_err(|_| GitHubError::Decode("file is not valid UTF-8".to_string()))
}

/// GitHub reports a stale blob SHA as 409, or as 422 "... does not match ...".
fn is_version_mismatch(status: u16, message: &str) -> bool {
    status == StatusCode::CONFLICT.as_u16()
        || (status == StatusCode::UNPROCESSABLE_ENTITY.as_u16() && message.contains("does not match"))
}

#[async_trait]
impl RepositoryService for GitHubClient {
    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn default_branch(&self) -> Result<String, GitHubError> {
        let url = self.url(&[])?;
        let repo: RepositoryResponse = self.get_json(url, &format!("repository {}", self.repo)).await?;
        debug!(branch = %repo.default_branch, "resolved default branch");
        Ok(repo.default_branch)
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn readme(&self, path: &str, git_ref: &str) -> Result<ReadmeSnapshot, GitHubError> {
        let mut url = self.url(&["contents", path])?;
        url.query_pairs_mut().append_pair("ref", git_ref);
        let body: ContentResponse = self
            .get_json(url, &format!("file {path} on {git_ref}"))
            .await?;
        let content = match (body.encoding.as_deref(), body.content.as_deref()) {
            (Some("base64"), Some(content)) => decode_content(content)?,
            (encoding, _) => {
                return Err(GitHubError::Decode(format!(
                    "{path} has unsupported encoding {encoding:?}"
                )))
            }
        };
        debug!(bytes = content.len(), sha = %body.sha, "read file");
        Ok(ReadmeSnapshot {
            path: path.to_string(),
            content,
            version: body.sha,
        })
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn pull_request(&self, number: u64) -> Result<PullRequest, GitHubError> {
        let url = self.url(&["pulls", &number.to_string()])?;
        let pr: PullResponse = self.get_json(url, &format!("pull request #{number}")).await?;
        debug!(title = %pr.title, "received PR metadata");
        Ok(PullRequest {
            number: pr.number,
            title: pr.title,
            html_url: pr.html_url,
        })
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn pull_request_files(&self, number: u64) -> Result<Vec<FileChange>, GitHubError> {
        let number = number.to_string();
        let files: Vec<FileResponse> = self
            .get_all_pages(&["pulls", &number, "files"], &format!("pull request #{number}"))
            .await?;
        Ok(files
            .into_iter()
            .map(|f| FileChange {
                filename: f.filename,
                patch: f.patch,
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn pull_request_commits(&self, number: u64) -> Result<Vec<String>, GitHubError> {
        let number = number.to_string();
        let commits: Vec<CommitEntry> = self
            .get_all_pages(&["pulls", &number, "commits"], &format!("pull request #{number}"))
            .await?;
        Ok(commits.into_iter().map(|c| c.commit.message).collect())
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn branch_head(&self, branch: &str) -> Result<String, GitHubError> {
        let url = self.url(&["git", "ref", "heads", branch])?;
        let reference: RefResponse = self.get_json(url, &format!("branch {branch}")).await?;
        Ok(reference.object.sha)
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), GitHubError> {
        let url = self.url(&["git", "refs"])?;
        let request = CreateRefRequest {
            reference: format!("refs/heads/{name}"),
            sha: from_sha,
        };
        let response = self
            .authorized(self.client.post(url))
            .json(&request)
            .send()
            .await?;
        check_status(response, &format!("repository {}", self.repo)).await?;
        debug!("created branch");
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn delete_branch(&self, name: &str) -> Result<(), GitHubError> {
        let url = self.url(&["git", "refs", "heads", name])?;
        let response = self.authorized(self.client.delete(url)).send().await?;
        check_status(response, &format!("branch {name}")).await?;
        debug!("deleted branch");
        Ok(())
    }

    #[instrument(skip(self, update), fields(repo = %self.repo, path = %update.path, branch = %update.branch))]
    async fn update_file(&self, update: &FileUpdate) -> Result<String, GitHubError> {
        let url = self.url(&["contents", &update.path])?;
        let request = UpdateContentRequest {
            message: &update.message,
            content: BASE64_STANDARD.encode(update.content.as_bytes()),
            sha: &update.version,
            branch: &update.branch,
        };
        let response = self
            .authorized(self.client.put(url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let message = error_message(response).await;
            if is_version_mismatch(status.as_u16(), &message) {
                return Err(GitHubError::Conflict {
                    path: update.path.clone(),
                    expected: update.version.clone(),
                });
            }
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response = check_status(response, &format!("file {}", update.path)).await?;
        let body: UpdateContentResponse = decode(response).await?;
        debug!(commit = %body.commit.sha, "committed file");
        Ok(body.commit.sha)
    }

    #[instrument(skip(self, pr), fields(repo = %self.repo, head = %pr.head, base = %pr.base))]
    async fn create_pull_request(
        &self,
        pr: &NewPullRequest,
    ) -> Result<PullRequestRef, GitHubError> {
        let url = self.url(&["pulls"])?;
        let request = CreatePullRequest {
            title: &pr.title,
            body: &pr.body,
            head: &pr.head,
            base: &pr.base,
        };
        let response = self
            .authorized(self.client.post(url))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, &format!("repository {}", self.repo)).await?;
        let created: CreatedPullResponse = decode(response).await?;
        debug!(number = created.number, "opened pull request");
        Ok(PullRequestRef {
            number: created.number,
            html_url: created.html_url,
        })
    }
}
