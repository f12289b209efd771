//! Scripted `TextGenerator` for pipeline tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{GenerationError, TextGenerator};

pub enum Reply {
    Text(String),
    Timeout,
    Unauthorized,
}

pub struct FakeGenerator {
    reply: Reply,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self::new(Reply::Text(text.to_string()))
    }

    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Timeout => Err(GenerationError::Timeout),
            Reply::Unauthorized => Err(GenerationError::Unauthorized {
                status: 401,
                message: "Incorrect API key provided".to_string(),
            }),
        }
    }
}
