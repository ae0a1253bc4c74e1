use crate::error::{LlmError, Result};
use crate::types::{ChatRequest, ChatResponse, MessageRole, Provider, ResponseMode, TokenUsage};
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared HTTP client settings for every provider call.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// One provider, one API key. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: Provider,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_string(),
            http: http_client(REQUEST_TIMEOUT),
        }
    }

    /// Point the client at another host (self-hosted gateway, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured(self.provider.to_string()));
        }
        let builder = match self.provider {
            Provider::OpenAi => self
                .http
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&openai_body(request)),
            Provider::Anthropic => self
                .http
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&anthropic_body(request)),
            Provider::Gemini => self
                .http
                .post(format!(
                    "{}/v1beta/models/{}:generateContent",
                    self.base_url, request.model
                ))
                .header("x-goog-api-key", &self.api_key)
                .json(&gemini_body(request)),
        };

        tracing::debug!(provider = %self.provider, model = %request.model, "chat request");
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let json: Value = resp.json().await?;
        let (text, usage) = match self.provider {
            Provider::OpenAi => parse_openai(&json),
            Provider::Anthropic => parse_anthropic(&json),
            Provider::Gemini => parse_gemini(&json),
        };
        let text = text.ok_or_else(|| LlmError::MissingField {
            provider: self.provider.to_string(),
            field: "content",
        })?;

        Ok(ChatResponse {
            text,
            provider: self.provider.to_string(),
            model: request.model.clone(),
            usage,
            mode: ResponseMode::Live,
        })
    }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn openai_body(request: &ChatRequest) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.is_empty() {
        messages.push(json!({ "role": "system", "content": request.system }));
    }
    for m in &request.messages {
        messages.push(json!({ "role": role_name(m.role), "content": m.content }));
    }
    json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    })
}

fn anthropic_body(request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({ "role": role_name(m.role), "content": m.content }))
        .collect();
    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    });
    if !request.system.is_empty() {
        body["system"] = json!(request.system);
    }
    body
}

fn gemini_body(request: &ChatRequest) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();
    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "maxOutputTokens": request.max_tokens,
            "temperature": request.temperature,
        },
    });
    if !request.system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
    }
    body
}

fn text_at(json: &Value, pointer: &str) -> Option<String> {
    json.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn usage_from(json: &Value, input: &str, output: &str) -> Option<TokenUsage> {
    let input = json.pointer(input).and_then(Value::as_u64);
    let output = json.pointer(output).and_then(Value::as_u64);
    if input.is_none() && output.is_none() {
        return None;
    }
    Some(TokenUsage {
        input_tokens: input.unwrap_or(0),
        output_tokens: output.unwrap_or(0),
    })
}

fn parse_openai(json: &Value) -> (Option<String>, Option<TokenUsage>) {
    (
        text_at(json, "/choices/0/message/content"),
        usage_from(json, "/usage/prompt_tokens", "/usage/completion_tokens"),
    )
}

fn parse_anthropic(json: &Value) -> (Option<String>, Option<TokenUsage>) {
    // Concatenate every text block; tool or thinking blocks are skipped.
    let text = json
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .filter(|t| !t.is_empty());
    (
        text,
        usage_from(json, "/usage/input_tokens", "/usage/output_tokens"),
    )
}

fn parse_gemini(json: &Value) -> (Option<String>, Option<TokenUsage>) {
    (
        text_at(json, "/candidates/0/content/parts/0/text"),
        usage_from(
            json,
            "/usageMetadata/promptTokenCount",
            "/usageMetadata/candidatesTokenCount",
        ),
    )
}
