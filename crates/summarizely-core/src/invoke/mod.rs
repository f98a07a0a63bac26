//! Provider invocation
//!
//! One call shape for every backend: a prompt goes in, markdown text or a
//! classified [`ProviderError`] comes out. Dispatch is a plain match over
//! [`ProviderId`].
//!
//! # Backends
//!
//! - **cli**: claude and codex run as child processes
//! - **ollama**: local HTTP service, the only backend that streams natively
//! - **cloud**: OpenAI, Anthropic and Gemini HTTPS APIs

pub mod cli;
pub mod cloud;
pub mod ollama;

use std::time::Duration;

use crate::{
    config::ProviderConfig,
    error::{ErrorKind, ProviderError},
    provider::{BackendKind, ProviderId},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Success text or a classified failure.
pub type InvocationResult = Result<String, ProviderError>;

/// Receives streamed text as it arrives.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(&str) + Send);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Pinned model; each backend has its own default otherwise.
    pub model: Option<String>,
    pub timeout: Duration,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            model: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Runs prompts against the configured backends.
#[derive(Debug, Clone)]
pub struct Engine {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl Engine {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Run a prompt and return the whole answer.
    pub async fn invoke(
        &self,
        provider: ProviderId,
        prompt: &str,
        options: &InvokeOptions,
    ) -> InvocationResult {
        self.dispatch(provider, prompt, options, None).await
    }

    /// Run a prompt, forwarding text to `sink` as it arrives.
    ///
    /// Backends without native streaming deliver the full answer as a single
    /// chunk. The returned text is everything passed to the sink.
    pub async fn invoke_streaming<F>(
        &self,
        provider: ProviderId,
        prompt: &str,
        options: &InvokeOptions,
        mut sink: F,
    ) -> InvocationResult
    where
        F: FnMut(&str) + Send,
    {
        self.dispatch(provider, prompt, options, Some(&mut sink)).await
    }

    async fn dispatch(
        &self,
        provider: ProviderId,
        prompt: &str,
        options: &InvokeOptions,
        sink: Option<ChunkSink<'_>>,
    ) -> InvocationResult {
        tracing::debug!(
            "Invoking {} ({} prompt chars, timeout {:?}, streaming: {})",
            provider,
            prompt.chars().count(),
            options.timeout,
            sink.is_some()
        );

        let text = match provider.kind() {
            BackendKind::LocalService => {
                return ollama::generate(&self.http, &self.config.ollama_url(), prompt, options, sink)
                    .await;
            }
            BackendKind::Cli => {
                let program = self.config.tool(provider).unwrap_or(provider.as_str());
                cli::run(provider, program, prompt, options).await?
            }
            BackendKind::Cloud => {
                let api_key = self.config.credential(provider).ok_or_else(|| {
                    ProviderError::new(
                        ErrorKind::Auth,
                        format!(
                            "{} is not set",
                            self.config.credential_var(provider).unwrap_or("API key")
                        ),
                    )
                })?;
                let base_url = self.config.endpoint(provider).unwrap_or_default();
                cloud::complete(&self.http, provider, base_url, api_key, prompt, options).await?
            }
        };

        if let Some(sink) = sink {
            sink(&text);
        }
        Ok(text)
    }
}

/// Classify a reqwest transport error.
pub(crate) fn classify_transport(
    err: &reqwest::Error,
    timeout: Duration,
    fallback: ErrorKind,
) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::timeout(timeout);
    }
    if let Some(status) = err.status() {
        return ProviderError::from_status(status.as_u16(), "");
    }
    ProviderError::new(fallback, err.to_string())
}
