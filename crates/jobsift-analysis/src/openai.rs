//! Provider backed by an OpenAI-compatible chat completions API.
//!
//! Both stages go through the structured-output path: the request carries a
//! strict JSON schema (`response_format: json_schema`) so the model returns
//! exactly the shape of [`StructuredListing`] or [`Judgment`], and parsing
//! failures are schema violations rather than prompt drift.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::LlmError;
use crate::prompts;
use crate::provider::LlmProvider;
use crate::schema::StructuredOutput;
use crate::types::{Judgment, JudgmentContext, ListingInput, StructuredListing, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const CONNECT_TIMEOUT_SECS: u64 = 10;

// ---- wire types -------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refusal: Option<String>,
}

impl WireMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            refusal: None,
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            refusal: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct StructuredRequest {
    model: String,
    messages: Vec<WireMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

// ---- provider ---------------------------------------------------------------

/// [`LlmProvider`] over an OpenAI-compatible `/chat/completions` endpoint.
///
/// Use [`OpenAiProvider::new`] for the hosted API or
/// [`OpenAiProvider::with_base_url`] for a compatible gateway or a mock
/// server in tests.
pub struct OpenAiProvider {
    http: Client,
    name: String,
    api_key: String,
    base_url: String,
    extract_model: String,
    judge_model: String,
}

impl OpenAiProvider {
    /// Creates a provider pointed at the hosted OpenAI API.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new(
        name: &str,
        api_key: &str,
        extract_model: &str,
        judge_model: &str,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        Self::with_base_url(
            name,
            api_key,
            extract_model,
            judge_model,
            timeout_secs,
            DEFAULT_BASE_URL,
        )
    }

    /// Creates a provider with a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn with_base_url(
        name: &str,
        api_key: &str,
        extract_model: &str,
        judge_model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent("jobsift/0.1")
            .build()?;

        Ok(Self {
            http,
            name: name.to_owned(),
            api_key: api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            extract_model: extract_model.to_owned(),
            judge_model: judge_model.to_owned(),
        })
    }

    /// Runs one structured-output call and parses the payload into `T`.
    async fn structured_call<T>(
        &self,
        model: &str,
        system: String,
        user: String,
        stage: &str,
    ) -> Result<(T, TokenUsage), LlmError>
    where
        T: StructuredOutput + serde::de::DeserializeOwned,
    {
        let request = StructuredRequest {
            model: model.to_owned(),
            messages: vec![WireMessage::system(system), WireMessage::user(user)],
            response_format: ResponseFormat {
                format_type: "json_schema".to_owned(),
                json_schema: JsonSchemaFormat {
                    name: T::type_name(),
                    strict: true,
                    schema: T::strict_schema(),
                },
            },
        };

        debug!(provider = %self.name, model = %request.model, stage, "structured output request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(if body.is_empty() {
                status.to_string()
            } else {
                body
            }));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!(
                "{stage} request failed ({status}): {body}"
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let usage = chat.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        let Some(choice) = chat.choices.into_iter().next() else {
            return Err(LlmError::Provider(format!(
                "{stage} response contained no choices"
            )));
        };
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(LlmError::ContentFiltered(format!(
                "{stage} response stopped by the provider content filter"
            )));
        }
        if let Some(refusal) = choice.message.refusal {
            return Err(LlmError::ContentFiltered(refusal));
        }
        let Some(content) = choice.message.content else {
            return Err(LlmError::Provider(format!(
                "{stage} response contained no content"
            )));
        };

        let parsed = serde_json::from_str::<T>(&content).map_err(|e| LlmError::Validation {
            context: stage.to_owned(),
            reason: e.to_string(),
        })?;
        Ok((parsed, usage))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> String {
        self.name.clone()
    }

    fn extract_model(&self) -> String {
        self.extract_model.clone()
    }

    fn judge_model(&self) -> String {
        self.judge_model.clone()
    }

    async fn extract(
        &self,
        input: &ListingInput,
    ) -> Result<(StructuredListing, TokenUsage), LlmError> {
        self.structured_call::<StructuredListing>(
            &self.extract_model,
            prompts::EXTRACTION_SYSTEM_PROMPT.to_owned(),
            prompts::extraction_user_prompt(input),
            "extraction",
        )
        .await
    }

    async fn judge(
        &self,
        input: &ListingInput,
        facts: &StructuredListing,
        context: &JudgmentContext,
    ) -> Result<(Judgment, TokenUsage), LlmError> {
        let (judgment, usage) = self
            .structured_call::<Judgment>(
                &self.judge_model,
                prompts::judgment_system_prompt(),
                prompts::judgment_user_prompt(input, facts, context),
                "judgment",
            )
            .await?;

        // Zero is the storage sentinel for technical failures; the model must
        // stay inside the rubric scale.
        if !(1..=10).contains(&judgment.trust_score) {
            return Err(LlmError::Validation {
                context: "judgment".to_owned(),
                reason: format!("trust score {} outside 1..=10", judgment.trust_score),
            });
        }
        Ok((judgment, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_request_serializes_strict_schema_envelope() {
        let request = StructuredRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                WireMessage::system("be precise"),
                WireMessage::user("extract this"),
            ],
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: StructuredListing::type_name(),
                    strict: true,
                    schema: StructuredListing::strict_schema(),
                },
            },
        };

        let value = serde_json::to_value(&request).expect("request serializes");
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["strict"], true);
        assert_eq!(
            value["response_format"]["json_schema"]["name"],
            "StructuredListing"
        );
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value["messages"][0].get("refusal").is_none());
    }

    #[test]
    fn chat_response_parses_usage_and_refusal() {
        let raw = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": null, "refusal": "cannot help"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed = serde_json::from_str::<ChatResponse>(raw).expect("response parses");
        let usage = parsed.usage.expect("usage present");
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 3);
        let choice = parsed.choices.into_iter().next().expect("one choice");
        assert_eq!(choice.message.refusal.as_deref(), Some("cannot help"));
        assert!(choice.message.content.is_none());
    }
}
