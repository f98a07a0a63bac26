//! Hosted model APIs: OpenAI chat completions, Anthropic messages and
//! Gemini generateContent. All three are single request/response calls.

use serde_json::{Value, json};

use super::{InvocationResult, InvokeOptions, classify_transport};
use crate::{
    error::{ErrorKind, ProviderError},
    provider::ProviderId,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Model used when none is pinned.
pub fn default_model(provider: ProviderId) -> Option<&'static str> {
    match provider {
        ProviderId::Openai => Some("gpt-4o-mini"),
        ProviderId::Anthropic => Some("claude-3-5-haiku-latest"),
        ProviderId::Google => Some("gemini-1.5-flash"),
        _ => None,
    }
}

pub async fn complete(
    http: &reqwest::Client,
    provider: ProviderId,
    base_url: &str,
    api_key: &str,
    prompt: &str,
    options: &InvokeOptions,
) -> InvocationResult {
    let model = options
        .model
        .as_deref()
        .or_else(|| default_model(provider))
        .ok_or_else(|| {
            ProviderError::new(
                ErrorKind::InvalidRequest,
                format!("{} is not a cloud provider", provider),
            )
        })?;

    let request = match provider {
        ProviderId::Openai => http
            .post(format!("{}/v1/chat/completions", base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
            })),
        ProviderId::Anthropic => http
            .post(format!("{}/v1/messages", base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": model,
                "max_tokens": MAX_OUTPUT_TOKENS,
                "messages": [{ "role": "user", "content": prompt }],
            })),
        _ => http
            .post(format!("{}/v1beta/models/{}:generateContent", base_url, model))
            .header("x-goog-api-key", api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            })),
    };

    tracing::debug!("Calling {} with model {}", provider.name(), model);
    let response = request
        .timeout(options.timeout)
        .send()
        .await
        .map_err(|e| classify_transport(&e, options.timeout, ErrorKind::Unknown))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = error_message(&body).unwrap_or(body);
        return Err(ProviderError::from_status(status.as_u16(), &detail));
    }

    let body: Value = response.json().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::timeout(options.timeout)
        } else {
            ProviderError::new(
                ErrorKind::Unknown,
                format!("invalid {} response: {}", provider.name(), e),
            )
        }
    })?;

    extract_text(provider, &body)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| {
            ProviderError::new(
                ErrorKind::Unknown,
                format!("{} response contained no text", provider.name()),
            )
        })
}

/// Pull the answer text out of a provider's response body.
pub fn extract_text(provider: ProviderId, body: &Value) -> Option<String> {
    match provider {
        ProviderId::Openai => body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string),
        ProviderId::Anthropic => join_text(
            body["content"]
                .as_array()?
                .iter()
                .filter(|block| block["type"].as_str().is_none_or(|t| t == "text")),
        ),
        ProviderId::Google => join_text(body["candidates"][0]["content"]["parts"].as_array()?.iter()),
        _ => None,
    }
}

fn join_text<'a>(parts: impl Iterator<Item = &'a Value>) -> Option<String> {
    let text: String = parts.filter_map(|p| p["text"].as_str()).collect();
    (!text.is_empty()).then_some(text)
}

/// The `error.message` field all three APIs use for failures.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match &value["error"] {
        Value::String(s) => Some(s.clone()),
        error => error["message"].as_str().map(str::to_string),
    }
}
