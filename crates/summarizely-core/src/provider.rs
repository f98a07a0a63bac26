use std::{
    fmt,
    process::{Command, Stdio},
    str::FromStr,
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::ProviderConfig,
    error::{ErrorKind, ProviderError},
};

/// How long a `--version` probe may run before it is killed.
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    ClaudeCli,
    CodexCli,
    Ollama,
    Openai,
    Anthropic,
    Google,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Cli,
    LocalService,
    Cloud,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::ClaudeCli,
        ProviderId::CodexCli,
        ProviderId::Ollama,
        ProviderId::Openai,
        ProviderId::Anthropic,
        ProviderId::Google,
    ];

    /// Identifier used on the command line and in metadata files
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::ClaudeCli => "claude-cli",
            ProviderId::CodexCli => "codex-cli",
            ProviderId::Ollama => "ollama",
            ProviderId::Openai => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Google => "google",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderId::ClaudeCli => "Claude CLI",
            ProviderId::CodexCli => "Codex CLI",
            ProviderId::Ollama => "Ollama",
            ProviderId::Openai => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
            ProviderId::Google => "Google Gemini",
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            ProviderId::ClaudeCli | ProviderId::CodexCli => BackendKind::Cli,
            ProviderId::Ollama => BackendKind::LocalService,
            ProviderId::Openai | ProviderId::Anthropic | ProviderId::Google => BackendKind::Cloud,
        }
    }

    /// Whether chunks arrive incrementally rather than as one final block
    pub fn supports_streaming(&self) -> bool {
        matches!(self, ProviderId::Ollama)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<_> = ProviderId::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown provider: {}. Valid options: {}", s, valid.join(", "))
            })
    }
}

/// The selected backend and why it was picked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub reason: String,
}

impl ProviderDescriptor {
    pub fn new(id: ProviderId, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No provider available ({reason})")]
pub struct NoProviderAvailable {
    pub reason: String,
}

/// Environment checks the registry depends on.
pub trait ToolProbe {
    /// Whether `program` resolves to an executable.
    fn is_installed(&self, program: &str) -> bool;

    /// Whether `program --version` exits successfully.
    fn version_ok(&self, program: &str) -> bool;
}

/// Probes the real system: PATH lookup and a bounded `--version` run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ToolProbe for SystemProbe {
    fn is_installed(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn version_ok(&self, program: &str) -> bool {
        let Ok(mut child) = Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            return false;
        };

        let deadline = Instant::now() + VERSION_PROBE_TIMEOUT;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return status.success(),
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
                _ => {
                    tracing::debug!("{} --version did not finish in time", program);
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
            }
        }
    }
}

/// Pick the best available provider.
///
/// Order: CLI assistants (claude, codex), then ollama (host override or a
/// working client), then cloud backends with a credential (openai,
/// anthropic, google). The first match wins.
pub fn select_provider(
    config: &ProviderConfig,
    probe: &dyn ToolProbe,
) -> Result<ProviderDescriptor, NoProviderAvailable> {
    let mut checked = Vec::new();

    for id in [ProviderId::ClaudeCli, ProviderId::CodexCli] {
        let program = config.tool(id).unwrap_or(id.as_str());
        if probe.is_installed(program) {
            tracing::info!("Selected {} ({} found on PATH)", id, program);
            return Ok(ProviderDescriptor::new(id, format!("{} found on PATH", program)));
        }
        checked.push(format!("{} not installed", program));
    }

    if let Some(host) = config.ollama_host.as_deref() {
        tracing::info!("Selected ollama (OLLAMA_HOST={})", host);
        return Ok(ProviderDescriptor::new(
            ProviderId::Ollama,
            format!("OLLAMA_HOST set ({})", host),
        ));
    }
    let ollama = config.tool(ProviderId::Ollama).unwrap_or("ollama");
    if probe.version_ok(ollama) {
        tracing::info!("Selected ollama ({} --version succeeded)", ollama);
        return Ok(ProviderDescriptor::new(ProviderId::Ollama, "Ollama detected"));
    }
    checked.push("OLLAMA_HOST unset and ollama not detected".to_string());

    for id in [ProviderId::Openai, ProviderId::Anthropic, ProviderId::Google] {
        let var = config.credential_var(id).unwrap_or_default();
        if config.credential(id).is_some() {
            tracing::info!("Selected {} ({} found)", id, var);
            return Ok(ProviderDescriptor::new(id, format!("{} found", var)));
        }
        checked.push(format!("{} not set", var));
    }

    Err(NoProviderAvailable {
        reason: checked.join("; "),
    })
}

/// A short actionable message for a failed invocation.
pub fn describe_failure(provider: ProviderId, err: &ProviderError) -> String {
    let hint = match (err.kind, provider.kind()) {
        (ErrorKind::NotFound, _) => format!("{} is not installed or not on PATH.", provider.name()),
        (ErrorKind::Auth, BackendKind::Cloud) => {
            format!("Check that a valid API key is set for {}.", provider.name())
        }
        (ErrorKind::Auth, _) => format!("{} is not logged in.", provider.name()),
        (ErrorKind::RateLimit, _) => "Rate limited; wait a moment and try again.".to_string(),
        (ErrorKind::Timeout, _) => {
            "The provider took too long; try a shorter transcript (--max-chars) or a larger --timeout."
                .to_string()
        }
        (ErrorKind::NoModels, _) => "No Ollama models installed. Try: ollama pull qwen2.5:0.5b-instruct".to_string(),
        (ErrorKind::Unavailable, BackendKind::LocalService) => {
            "Is Ollama running? Start it with: ollama serve".to_string()
        }
        (ErrorKind::InvalidRequest, _) => {
            "The request was rejected; check the model name (--model).".to_string()
        }
        _ => String::new(),
    };

    if hint.is_empty() {
        format!("{} error ({}): {}", provider.name(), err.kind, err.message)
    } else {
        format!(
            "{} error ({}): {}\n{}",
            provider.name(),
            err.kind,
            err.message,
            hint
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeProbe {
        installed: HashSet<&'static str>,
        versions: HashSet<&'static str>,
    }

    impl ToolProbe for FakeProbe {
        fn is_installed(&self, program: &str) -> bool {
            self.installed.contains(program)
        }

        fn version_ok(&self, program: &str) -> bool {
            self.versions.contains(program)
        }
    }

    #[test]
    fn test_cloud_credential_only() {
        let config = ProviderConfig::from_vars([("OPENAI_API_KEY", "sk-test")]);
        let choice = select_provider(&config, &FakeProbe::default()).unwrap();
        assert_eq!(choice.id, ProviderId::Openai);
        assert!(choice.reason.contains("OPENAI_API_KEY"));

        // Same snapshot, same answer.
        assert_eq!(select_provider(&config, &FakeProbe::default()).unwrap(), choice);
    }

    #[test]
    fn test_cloud_order() {
        let config = ProviderConfig::from_vars([
            ("GOOGLE_API_KEY", "g"),
            ("ANTHROPIC_API_KEY", "a"),
        ]);
        let choice = select_provider(&config, &FakeProbe::default()).unwrap();
        assert_eq!(choice.id, ProviderId::Anthropic);
        assert_eq!(choice.reason, "ANTHROPIC_API_KEY found");
    }

    #[test]
    fn test_cli_preferred_over_everything() {
        let config = ProviderConfig::from_vars([
            ("OPENAI_API_KEY", "sk"),
            ("OLLAMA_HOST", "127.0.0.1:11434"),
        ]);
        let probe = FakeProbe {
            installed: HashSet::from(["codex"]),
            ..Default::default()
        };
        assert_eq!(select_provider(&config, &probe).unwrap().id, ProviderId::CodexCli);

        let probe = FakeProbe {
            installed: HashSet::from(["codex", "claude"]),
            ..Default::default()
        };
        assert_eq!(select_provider(&config, &probe).unwrap().id, ProviderId::ClaudeCli);
    }

    #[test]
    fn test_ollama_detection() {
        let config = ProviderConfig::from_vars([("OPENAI_API_KEY", "sk")]);
        let probe = FakeProbe {
            versions: HashSet::from(["ollama"]),
            ..Default::default()
        };
        let choice = select_provider(&config, &probe).unwrap();
        assert_eq!(choice.id, ProviderId::Ollama);
        assert_eq!(choice.reason, "Ollama detected");

        let config = ProviderConfig::from_vars([("OLLAMA_HOST", "box:11434")]);
        let choice = select_provider(&config, &FakeProbe::default()).unwrap();
        assert_eq!(choice.id, ProviderId::Ollama);
        assert!(choice.reason.contains("OLLAMA_HOST"));
    }

    #[test]
    fn test_nothing_available() {
        let err = select_provider(&ProviderConfig::default(), &FakeProbe::default()).unwrap_err();
        assert!(err.reason.contains("claude not installed"));
        assert!(err.reason.contains("OPENAI_API_KEY not set"));
        assert!(err.reason.contains("GOOGLE_API_KEY not set"));
    }

    #[test]
    fn test_parse_provider_id() {
        assert_eq!("codex-cli".parse::<ProviderId>(), Ok(ProviderId::CodexCli));
        assert!("gpt".parse::<ProviderId>().unwrap_err().contains("claude-cli"));
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>(), Ok(id));
        }
    }

    #[test]
    fn test_only_ollama_streams() {
        let streaming: Vec<_> = ProviderId::ALL
            .into_iter()
            .filter(ProviderId::supports_streaming)
            .collect();
        assert_eq!(streaming, vec![ProviderId::Ollama]);
    }

    #[test]
    fn test_describe_failure() {
        let err = ProviderError::from_status(401, "");
        let msg = describe_failure(ProviderId::Openai, &err);
        assert!(msg.starts_with("OpenAI error (auth)"));
        assert!(msg.contains("API key"));
    }

    #[test]
    fn test_system_probe_missing_binary() {
        let probe = SystemProbe;
        assert!(!probe.is_installed("summarizely-no-such-tool"));
        assert!(!probe.version_ok("summarizely-no-such-tool"));
    }
}
