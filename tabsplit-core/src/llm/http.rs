//! HTTP client for Ollama, Anthropic, and OpenAI completion APIs.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;

use super::{LlmClient, SYSTEM_PROMPT};
use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, Result};
use crate::types::ReceiptImage;

/// Blocking LLM client; requests run on a private current-thread runtime.
pub struct HttpLlmClient {
    model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<String>,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());
        let api_key = config.api_key.clone().or_else(|| {
            config
                .provider
                .api_key_env()
                .and_then(|var| std::env::var(var).ok())
        });

        if matches!(config.provider, LlmProvider::Claude | LlmProvider::OpenAI) && api_key.is_none()
        {
            return Err(Error::Config(
                "llm.api_key (or provider env var) is required".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Llm(format!("failed to build tokio runtime: {e}")))?;
        let timeout_secs = config.timeout_secs.max(1);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            provider: config.provider,
            endpoint,
            api_key,
            runtime,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn request_body(&self, prompt: &str, image: Option<&ReceiptImage>) -> serde_json::Value {
        match self.provider {
            LlmProvider::Ollama => {
                let mut body = json!({
                    "model": self.model,
                    "system": SYSTEM_PROMPT,
                    "prompt": prompt,
                    "format": "json",
                    "stream": false,
                });
                if let Some(image) = image {
                    body["images"] = json!([image.to_base64()]);
                }
                body
            }
            LlmProvider::Claude => {
                let mut content = Vec::new();
                if let Some(image) = image {
                    content.push(json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.mime_type,
                            "data": image.to_base64(),
                        }
                    }));
                }
                content.push(json!({ "type": "text", "text": prompt }));
                json!({
                    "model": self.model,
                    "max_tokens": 2048,
                    "temperature": 0,
                    "system": SYSTEM_PROMPT,
                    "messages": [{ "role": "user", "content": content }],
                })
            }
            LlmProvider::OpenAI => {
                let mut content = vec![json!({ "type": "text", "text": prompt })];
                if let Some(image) = image {
                    content.push(json!({
                        "type": "image_url",
                        "image_url": { "url": image.to_data_url() }
                    }));
                }
                json!({
                    "model": self.model,
                    "temperature": 0,
                    "response_format": { "type": "json_object" },
                    "messages": [
                        { "role": "system", "content": SYSTEM_PROMPT },
                        { "role": "user", "content": content }
                    ]
                })
            }
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = self.api_key.as_deref().unwrap_or_default();
        match self.provider {
            LlmProvider::Ollama => {}
            LlmProvider::Claude => {
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(key)
                        .map_err(|e| Error::Llm(format!("invalid claude api key header: {e}")))?,
                );
                headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
            }
            LlmProvider::OpenAI => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {key}"))
                        .map_err(|e| Error::Llm(format!("invalid auth header: {e}")))?,
                );
            }
        }
        Ok(headers)
    }

    fn path(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "/api/generate",
            LlmProvider::Claude => "/v1/messages",
            LlmProvider::OpenAI => "/v1/chat/completions",
        }
    }
}

/// Pull the completion text out of a provider response body.
fn extract_text(provider: LlmProvider, json: &serde_json::Value) -> Result<String> {
    let text = match provider {
        LlmProvider::Ollama => json.get("response").and_then(|v| v.as_str()),
        LlmProvider::Claude => json
            .get("content")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("text"))
            .and_then(|v| v.as_str()),
        LlmProvider::OpenAI => json
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str()),
    };

    text.map(ToString::to_string).ok_or_else(|| {
        Error::Llm(format!(
            "{:?} response missing completion text",
            provider
        ))
    })
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, prompt: &str, image: Option<&ReceiptImage>) -> Result<String> {
        let url = self.url(self.path());
        let body = self.request_body(prompt, image);
        let headers = self.headers()?;

        tracing::debug!(
            provider = ?self.provider,
            model = %self.model,
            with_image = image.is_some(),
            "Sending LLM request"
        );

        self.runtime.block_on(async {
            let resp = self
                .http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Llm(format!("request failed: {e}")))?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| Error::Llm(format!("read body failed: {e}")))?;
            if !status.is_success() {
                return Err(Error::Llm(format!(
                    "{:?} returned {}: {}",
                    self.provider,
                    status.as_u16(),
                    body
                )));
            }
            let json: serde_json::Value = serde_json::from_str(&body)?;
            extract_text(self.provider, &json)
        })
    }
}
