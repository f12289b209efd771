use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{GenerationError, TextGenerator};
use crate::config::GenerationSettings;

const SYSTEM_PROMPT: &str =
    "You are a technical writer who keeps a project's README accurate and concise.";

/// Minimal request/response structs for the OpenAI Chat Completions API.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Chat Completions client for OpenAI and API-compatible servers.
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    model: String,
    api_base_url: String,
}

impl OpenAiGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        if self.api_base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.api_base_url)
        } else {
            format!("{}/v1/chat/completions", self.api_base_url)
        }
    }
}

fn classify_status(status: StatusCode, message: String) -> GenerationError {
    let status = status.as_u16();
    match status {
        401 | 403 => GenerationError::Unauthorized { status, message },
        400 | 413 => GenerationError::InvalidInput { status, message },
        _ => GenerationError::Api { status, message },
    }
}

fn request_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Request(err)
    }
}

/// First choice's text, verbatim. Empty or missing content is an error.
fn first_choice(response: ChatResponse) -> Result<String, GenerationError> {
    if let Some(usage) = &response.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "token usage"
        );
    }
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.is_empty())
        .ok_or(GenerationError::EmptyResponse)
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_bytes = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        info!("calling generation service");
        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(classify_status(status, message));
        }

        let body: ChatResponse = response.json().await.map_err(request_error)?;
        let content = first_choice(body)?;
        debug!(bytes = content.len(), "received generated text");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(base: &str) -> GenerationSettings {
        GenerationSettings {
            api_key: "sk-test".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_base_url: base.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_chat_url() {
        let g = OpenAiGenerator::new(&settings("https://api.openai.com/")).unwrap();
        assert_eq!(g.chat_url(), "https://api.openai.com/v1/chat/completions");
        let g = OpenAiGenerator::new(&settings("http://localhost:8080/v1")).unwrap();
        assert_eq!(g.chat_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key".into()),
            GenerationError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYLOAD_TOO_LARGE, "too long".into()),
            GenerationError::InvalidInput { status: 413, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "upstream".into()),
            GenerationError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_first_choice_verbatim() {
        let json = r##"{
            "choices": [{"message": {"role": "assistant", "content": "# Title\n\n## New Section\n"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"##;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_choice(response).unwrap(), "# Title\n\n## New Section\n");
    }

    #[test]
    fn test_first_choice_empty() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(first_choice(response), Err(GenerationError::EmptyResponse)));

        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(first_choice(response), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "prompt",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "m");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "prompt");
    }
}
