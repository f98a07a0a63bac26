//! Local Ollama backend
//!
//! Talks to the Ollama HTTP API. When no model is pinned the installed
//! catalog decides: the default model if present, else the smallest
//! instruction-tuned model, else whatever is listed first.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;

use super::{InvocationResult, InvokeOptions, classify_transport};
use crate::error::{ErrorKind, ProviderError};

pub const DEFAULT_MODEL: &str = "qwen2.5:0.5b-instruct";

const CATALOG_TIMEOUT: Duration = Duration::from_secs(5);

/// One entry of `/api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// Pick a model from the installed catalog.
pub fn choose_model(models: &[ModelEntry]) -> Option<&str> {
    if let Some(m) = models.iter().find(|m| m.name == DEFAULT_MODEL) {
        return Some(&m.name);
    }
    models
        .iter()
        .filter(|m| is_instruction_tuned(&m.name))
        .min_by_key(|m| m.size)
        .or_else(|| models.first())
        .map(|m| m.name.as_str())
}

fn is_instruction_tuned(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("instruct") || name.contains("chat") || name.contains("-it") || name.ends_with(":it")
}

/// List installed models.
///
/// The catalog call is bounded by the caller's timeout, capped at five
/// seconds, and a timeout or 5xx is retried once.
pub async fn list_models(
    http: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Result<Vec<ModelEntry>, ProviderError> {
    let timeout = timeout.min(CATALOG_TIMEOUT);
    match fetch_catalog(http, base_url, timeout).await {
        Err(e) if e.is_transient() => {
            tracing::warn!("Ollama catalog request failed ({}), retrying once", e);
            fetch_catalog(http, base_url, timeout).await
        }
        other => other,
    }
}

async fn fetch_catalog(
    http: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Result<Vec<ModelEntry>, ProviderError> {
    let response = http
        .get(format!("{}/api/tags", base_url))
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| unreachable_error(&e, base_url, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }

    let tags: TagsResponse = response.json().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::timeout(timeout)
        } else {
            ProviderError::new(
                ErrorKind::Unknown,
                format!("failed to parse model catalog: {}", e),
            )
        }
    })?;
    Ok(tags.models)
}

/// Generate a completion, streaming to `sink` when given.
///
/// Timeouts and 5xx responses are retried once, unless text has already
/// reached the sink.
pub async fn generate(
    http: &reqwest::Client,
    base_url: &str,
    prompt: &str,
    options: &InvokeOptions,
    mut sink: Option<&mut (dyn FnMut(&str) + Send + '_)>,
) -> InvocationResult {
    let model = match &options.model {
        Some(model) => model.clone(),
        None => {
            let models = list_models(http, base_url, options.timeout).await?;
            let model = choose_model(&models).ok_or_else(|| {
                ProviderError::new(
                    ErrorKind::NoModels,
                    format!("no models installed in Ollama at {}", base_url),
                )
            })?;
            tracing::info!("Using Ollama model {}", model);
            model.to_string()
        }
    };

    let mut retried = false;
    loop {
        let mut emitted = false;
        let result = request(
            http,
            base_url,
            &model,
            prompt,
            options.timeout,
            sink.as_deref_mut(),
            &mut emitted,
        )
        .await;

        match result {
            Err(e) if e.is_transient() && !retried && !emitted => {
                tracing::warn!("Ollama request failed ({}), retrying once", e);
                retried = true;
            }
            other => return other,
        }
    }
}

async fn request(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    prompt: &str,
    timeout: Duration,
    sink: Option<&mut (dyn FnMut(&str) + Send + '_)>,
    emitted: &mut bool,
) -> InvocationResult {
    let body = serde_json::json!({
        "model": model,
        "prompt": prompt,
        "stream": sink.is_some(),
    });

    tracing::debug!("Calling Ollama generate API with model: {}", model);
    let response = http
        .post(format!("{}/api/generate", base_url))
        .timeout(timeout)
        .json(&body)
        .send()
        .await
        .map_err(|e| unreachable_error(&e, base_url, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }

    let Some(sink) = sink else {
        let chunk: GenerateChunk = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::timeout(timeout)
            } else {
                ProviderError::new(ErrorKind::Unknown, format!("invalid Ollama response: {}", e))
            }
        })?;
        if let Some(error) = chunk.error {
            return Err(ProviderError::new(ErrorKind::Unavailable, error));
        }
        let text = chunk.response.trim().to_string();
        if text.is_empty() {
            return Err(empty_response());
        }
        return Ok(text);
    };

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut text = String::new();

    while let Some(bytes) = stream.next().await {
        let bytes = bytes.map_err(|e| classify_transport(&e, timeout, ErrorKind::Unavailable))?;
        buffer.extend_from_slice(&bytes);

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if stream_line(&line, &mut text, sink, emitted)? {
                return finish_stream(text);
            }
        }
    }

    if !buffer.is_empty() {
        stream_line(&buffer, &mut text, sink, emitted)?;
    }
    finish_stream(text)
}

/// Handle one NDJSON line; returns true once Ollama reports `done`.
fn stream_line(
    line: &[u8],
    text: &mut String,
    sink: &mut (dyn FnMut(&str) + Send),
    emitted: &mut bool,
) -> Result<bool, ProviderError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }

    let chunk: GenerateChunk = serde_json::from_str(line).map_err(|e| {
        ProviderError::new(ErrorKind::Unknown, format!("invalid Ollama stream line: {}", e))
    })?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::new(ErrorKind::Unavailable, error));
    }
    if !chunk.response.is_empty() {
        sink(&chunk.response);
        text.push_str(&chunk.response);
        *emitted = true;
    }
    Ok(chunk.done)
}

fn finish_stream(text: String) -> InvocationResult {
    if text.trim().is_empty() {
        Err(empty_response())
    } else {
        Ok(text)
    }
}

fn empty_response() -> ProviderError {
    ProviderError::new(ErrorKind::Unavailable, "Ollama returned an empty response")
}

fn unreachable_error(err: &reqwest::Error, base_url: &str, timeout: Duration) -> ProviderError {
    if err.is_connect() {
        return ProviderError::new(
            ErrorKind::Unavailable,
            format!("Ollama not reachable at {}", base_url),
        );
    }
    classify_transport(err, timeout, ErrorKind::Unavailable)
}
