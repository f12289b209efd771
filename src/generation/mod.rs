pub mod openai;

#[cfg(test)]
pub mod fake;

pub use openai::OpenAiGenerator;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation request timed out")]
    Timeout,

    #[error("generation service rejected credentials (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("generation service rejected the prompt (HTTP {status}): {message}")]
    InvalidInput { status: u16, message: String },

    #[error("generation service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("generation service returned no text")]
    EmptyResponse,
}

/// Turns a prompt into replacement README text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
