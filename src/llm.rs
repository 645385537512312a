use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::GenerateError;

/// Instruction placed in front of the extracted document text.
pub const REPLY_INSTRUCTION: &str = "Draft a reply to the attached request from a government \
authority, in accordance with the legislation of the Russian Federation:";

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub fn build_prompt(content: &str) -> String {
    let mut result = String::with_capacity(REPLY_INSTRUCTION.len() + content.len() + 2);
    result.push_str(REPLY_INSTRUCTION);
    result.push_str("\n\n");
    result.push_str(content);
    result
}

/// Client for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self, GenerateError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Drafts a reply to `text`. Non-streaming; only the first choice is used.
    pub async fn generate(&self, text: &str) -> Result<String, GenerateError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![Message {
                role: "user",
                content: build_prompt(text),
            }],
            stream: false,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        debug!(%url, model = %self.config.model, chars = text.len(), "calling chat completion");

        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = res.json().await.map_err(|e| self.classify(e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerateError::MalformedResponse)
    }

    fn classify(&self, err: reqwest::Error) -> GenerateError {
        if err.is_timeout() {
            GenerateError::Timeout {
                secs: self.config.timeout.as_secs(),
            }
        } else if err.is_decode() {
            GenerateError::MalformedResponse
        } else {
            GenerateError::Http(err)
        }
    }
}
