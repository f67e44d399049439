//! OpenAI-compatible chat completions client.
//!
//! Works with Perplexity, OpenAI, Ollama, vLLM, and any other endpoint
//! that follows the chat completions contract. Interviews never use
//! tool calls or streaming, so the client speaks only the plain
//! request/response subset.

use serde_json::Value;

use iv_domain::config::LlmConfig;
use iv_domain::{Error, Result};

use crate::traits::{ChatMessage, ChatRequest, ChatResponse};

pub struct OpenAiCompatClient {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    default_temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.resolve_api_key(),
            default_model: cfg.model.clone(),
            default_temperature: cfg.temperature,
            client,
        })
    }

    /// Send a chat completion request and wait for the full response.
    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&req);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            let message = payload
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(Error::Provider {
                provider: "openai_compat".into(),
                message: format!("{status}: {message}"),
            });
        }

        parse_chat_response(&payload)
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_json).collect();
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let temperature = req.temperature.unwrap_or(self.default_temperature);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "stream": false,
        });
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        body
    }
}

fn msg_to_json(msg: &ChatMessage) -> Value {
    serde_json::json!({
        "role": msg.role.as_str(),
        "content": msg.content,
    })
}

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(ChatResponse {
        content,
        model,
        finish_reason,
    })
}
