//! Provider configuration
//!
//! Everything the registry and the invocation engine read from the outside
//! world is captured once in a [`ProviderConfig`] and passed in explicitly.

use crate::provider::ProviderId;

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Program names (or paths) of the supported command-line assistants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliTools {
    pub claude: String,
    pub codex: String,
    pub ollama: String,
}

impl Default for CliTools {
    fn default() -> Self {
        Self {
            claude: "claude".to_string(),
            codex: "codex".to_string(),
            ollama: "ollama".to_string(),
        }
    }
}

/// Base URLs of the HTTP backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub openai: String,
    pub anthropic: String,
    pub google: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openai: "https://api.openai.com".to_string(),
            anthropic: "https://api.anthropic.com".to_string(),
            google: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Read-only snapshot of provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Explicit ollama host (`OLLAMA_HOST`).
    pub ollama_host: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// `GOOGLE_API_KEY`, or `GEMINI_API_KEY` when the former is unset.
    pub google_api_key: Option<String>,
    /// Which variable supplied `google_api_key`.
    pub google_key_var: Option<&'static str>,
    pub tools: CliTools,
    pub endpoints: Endpoints,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables. Empty values count as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        let mut gemini_key = None;

        for (key, value) in vars {
            let value: String = value.into();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let value = Some(value.to_string());
            match key.as_ref() {
                "OLLAMA_HOST" => config.ollama_host = value,
                "OPENAI_API_KEY" => config.openai_api_key = value,
                "ANTHROPIC_API_KEY" => config.anthropic_api_key = value,
                "GOOGLE_API_KEY" => config.google_api_key = value,
                "GEMINI_API_KEY" => gemini_key = value,
                _ => {}
            }
        }

        if config.google_api_key.is_some() {
            config.google_key_var = Some("GOOGLE_API_KEY");
        } else if gemini_key.is_some() {
            config.google_api_key = gemini_key;
            config.google_key_var = Some("GEMINI_API_KEY");
        }

        config
    }

    /// Credential for a cloud backend, if configured.
    pub fn credential(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::Openai => self.openai_api_key.as_deref(),
            ProviderId::Anthropic => self.anthropic_api_key.as_deref(),
            ProviderId::Google => self.google_api_key.as_deref(),
            _ => None,
        }
    }

    /// Name of the variable a cloud credential is read from.
    pub fn credential_var(&self, provider: ProviderId) -> Option<&'static str> {
        match provider {
            ProviderId::Openai => Some("OPENAI_API_KEY"),
            ProviderId::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderId::Google => Some(self.google_key_var.unwrap_or("GOOGLE_API_KEY")),
            _ => None,
        }
    }

    /// Ollama base URL; accepts bare `host:port` overrides.
    pub fn ollama_url(&self) -> String {
        match self.ollama_host.as_deref() {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                host.trim_end_matches('/').to_string()
            }
            Some(host) => format!("http://{}", host.trim_end_matches('/')),
            None => DEFAULT_OLLAMA_URL.to_string(),
        }
    }

    pub fn endpoint(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::Openai => Some(self.endpoints.openai.trim_end_matches('/')),
            ProviderId::Anthropic => Some(self.endpoints.anthropic.trim_end_matches('/')),
            ProviderId::Google => Some(self.endpoints.google.trim_end_matches('/')),
            _ => None,
        }
    }

    pub fn tool(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::ClaudeCli => Some(&self.tools.claude),
            ProviderId::CodexCli => Some(&self.tools.codex),
            ProviderId::Ollama => Some(&self.tools.ollama),
            _ => None,
        }
    }
}
