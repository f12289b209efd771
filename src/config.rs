use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::github::RepoPath;

/// Default name of the optional config file in the working directory.
pub const CONFIG_FILE: &str = ".readme-updater.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid REPO_PATH {0:?}: expected owner/name")]
    InvalidRepoPath(String),

    #[error("Invalid PR_NUMBER {0:?}: expected a positive integer")]
    InvalidPrNumber(String),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Raw configuration as read from .readme-updater.toml.
/// Every field is optional here; `Config::validate` decides what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// API token. Overridden by AUTH_TOKEN (or GITHUB_TOKEN).
    pub token: Option<String>,
    /// `owner/name`. Overridden by REPO_PATH.
    pub repo: Option<String>,
    /// Overridden by PR_NUMBER.
    pub pr_number: Option<u64>,
    /// REST endpoint, for GitHub Enterprise.
    pub api_url: Option<String>,
    /// Branch the proposal PR targets. Defaults to the repository's default branch.
    pub base_branch: Option<String>,
    pub readme_path: Option<String>,
    pub branch_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationConfig {
    /// Overridden by OPENAI_API_KEY.
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationConfig {
    pub enabled: Option<bool>,
    pub max_bytes: Option<usize>,
}

/// Validated settings for one run. Built once at startup, before any network call.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub repo: RepoPath,
    pub pr_number: u64,
    pub api_url: String,
    pub base_branch: Option<String>,
    pub readme_path: String,
    pub branch_prefix: String,
    pub generation: GenerationSettings,
    pub validation: ValidationPolicy,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

/// Controls the optional sanity check on generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub enabled: bool,
    pub max_bytes: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_bytes: 256 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from .readme-updater.toml in the
    /// current directory when no path is given.
    /// A missing default file yields the default config; a missing explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Merge environment overrides and check everything the run needs.
    ///
    /// `env` is a lookup function so tests don't have to touch the process
    /// environment; `main` passes `|k| std::env::var(k).ok()`.
    pub fn validate<F>(self, env: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let token = env("AUTH_TOKEN")
            .or_else(|| env("GITHUB_TOKEN"))
            .or(self.github.token)
            .ok_or(ConfigError::Missing("AUTH_TOKEN"))?;

        let repo_raw = env("REPO_PATH")
            .or(self.github.repo)
            .ok_or(ConfigError::Missing("REPO_PATH"))?;
        let repo = RepoPath::parse(&repo_raw)
            .ok_or_else(|| ConfigError::InvalidRepoPath(repo_raw.clone()))?;

        let pr_number = match env("PR_NUMBER") {
            Some(raw) => parse_pr_number(&raw)?,
            None => match self.github.pr_number {
                Some(0) => return Err(ConfigError::InvalidPrNumber("0".to_string())),
                Some(n) => n,
                None => return Err(ConfigError::Missing("PR_NUMBER")),
            },
        };

        let api_key = env("OPENAI_API_KEY")
            .or(self.generation.api_key)
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let timeout_secs = self.generation.timeout_secs.unwrap_or(90);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "generation.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        let defaults = ValidationPolicy::default();
        let validation = ValidationPolicy {
            enabled: self.validation.enabled.unwrap_or(defaults.enabled),
            max_bytes: self.validation.max_bytes.unwrap_or(defaults.max_bytes),
        };

        let readme_path = self
            .github
            .readme_path
            .unwrap_or_else(|| "README.md".to_string());
        if readme_path.trim().is_empty() || readme_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "github.readme_path",
                reason: format!("{readme_path:?} is not a repository-relative path"),
            });
        }

        let branch_prefix = self
            .github
            .branch_prefix
            .unwrap_or_else(|| "readme-update".to_string());
        let branch_prefix = branch_prefix.trim_matches('/').to_string();
        if branch_prefix.is_empty() || branch_prefix.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                name: "github.branch_prefix",
                reason: "must be non-empty and contain no whitespace".to_string(),
            });
        }

        Ok(Settings {
            token,
            repo,
            pr_number,
            api_url: self
                .github
                .api_url
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            base_branch: self.github.base_branch,
            readme_path,
            branch_prefix,
            generation: GenerationSettings {
                api_key,
                model: env("README_UPDATER_MODEL")
                    .or(self.generation.model)
                    .unwrap_or_else(|| "gpt-4o-mini".to_string()),
                api_base_url: env("OPENAI_BASE_URL")
                    .or(self.generation.api_base_url)
                    .unwrap_or_else(|| "https://api.openai.com".to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            validation,
        })
    }
}

/// Plain decimal digits only; `u64::from_str` would also take a leading `+`.
fn parse_pr_number(raw: &str) -> Result<u64, ConfigError> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::InvalidPrNumber(raw.to_string()));
    }
    match digits.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidPrNumber(raw.to_string())),
    }
}
