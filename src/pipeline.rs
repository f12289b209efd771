use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{ConfigError, Settings, ValidationPolicy};
use crate::generation::{GenerationError, TextGenerator};
use crate::github::{GitHubError, PullRequest, RepositoryService};
use crate::output::OutputError;
use crate::prompt::build_prompt;
use crate::publish::{PublishError, PublishResult, Publisher};
use crate::validate::{self, ValidationError};

/// Every way a run can end early. None of these are recovered from.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("repository service error: {0}")]
    Repository(GitHubError),

    #[error("generation service error: {0}")]
    Generation(#[from] GenerationError),

    #[error("generated README rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("conflict: {path} changed since it was read (expected blob {expected})")]
    Conflict { path: String, expected: String },

    #[error("publish failed: {0}")]
    Publish(PublishError),

    #[error("output failed: {0}")]
    Output(#[from] OutputError),
}

impl From<GitHubError> for RunError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::NotFound(resource) => RunError::NotFound(resource),
            GitHubError::Conflict { path, expected } => RunError::Conflict { path, expected },
            other => RunError::Repository(other),
        }
    }
}

impl From<PublishError> for RunError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Conflict { path, expected } => RunError::Conflict { path, expected },
            other => RunError::Publish(other),
        }
    }
}

/// Per-run knobs, taken from validated `Settings`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pr_number: u64,
    pub readme_path: String,
    pub base_branch: Option<String>,
    pub branch_prefix: String,
    pub validation: ValidationPolicy,
    /// Stop after generation; nothing is written to the repository.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings, dry_run: bool) -> Self {
        Self {
            pr_number: settings.pr_number,
            readme_path: settings.readme_path.clone(),
            base_branch: settings.base_branch.clone(),
            branch_prefix: settings.branch_prefix.clone(),
            validation: settings.validation.clone(),
            dry_run,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Published {
        source: PullRequest,
        result: PublishResult,
    },
    DryRun {
        source: PullRequest,
        base: String,
        readme: String,
    },
}

pub struct Pipeline<'a> {
    repo: &'a dyn RepositoryService,
    generator: &'a dyn TextGenerator,
    options: RunOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        repo: &'a dyn RepositoryService,
        generator: &'a dyn TextGenerator,
        options: RunOptions,
    ) -> Self {
        Self {
            repo,
            generator,
            options,
        }
    }

    /// Read → prompt → generate → validate → publish, one step at a time.
    /// All reads happen before generation; nothing is written unless generation
    /// and validation succeed.
    #[instrument(skip_all, fields(pr = self.options.pr_number, dry_run = self.options.dry_run))]
    pub async fn run(&self, at: DateTime<Utc>) -> Result<Outcome, RunError> {
        let base = match &self.options.base_branch {
            Some(branch) => branch.clone(),
            None => self.repo.default_branch().await?,
        };

        info!(path = %self.options.readme_path, base = %base, "reading README");
        let readme = self.repo.readme(&self.options.readme_path, &base).await?;

        info!("fetching pull request");
        let source = self.repo.pull_request(self.options.pr_number).await?;
        let files = self.repo.pull_request_files(source.number).await?;
        let commits = self.repo.pull_request_commits(source.number).await?;
        info!(files = files.len(), commits = commits.len(), "collected pull request changes");

        let prompt = build_prompt(&files, &readme.content, &commits);
        debug!(bytes = prompt.len(), "built prompt");

        let generated = self.generator.generate(&prompt).await?;
        let content = validate::check(&generated, &readme.content, &self.options.validation)?;
        info!(bytes = content.len(), "generated README");

        if self.options.dry_run {
            return Ok(Outcome::DryRun {
                source,
                base,
                readme: content,
            });
        }

        let result = Publisher::new(self.repo, self.options.branch_prefix.as_str())
            .publish(&source, &readme, &base, &content, at)
            .await?;
        Ok(Outcome::Published { source, result })
    }
}
