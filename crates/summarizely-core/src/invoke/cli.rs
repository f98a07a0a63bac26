//! Command-line assistant backends
//!
//! `claude` gets the prompt as a single `-p` argument; it misbehaves when its
//! stdin is closed early. `codex exec -` reads the prompt from stdin and
//! prints a log banner around its answer, and sometimes only reports a file
//! it wrote the answer to.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::LazyLock,
};

use regex::Regex;
use tokio::{io::AsyncWriteExt, process::Command};

use super::{InvocationResult, InvokeOptions};
use crate::{
    error::{ErrorKind, ProviderError},
    provider::ProviderId,
};

static BANNER_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[\d{4}-\d{2}-\d{2}T[^\]]*\]|OpenAI Codex\b)").expect("banner pattern is valid")
});

static ANSWER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[[^\]]+\]\s+)?codex\s*$").expect("marker pattern is valid")
});

static TOKENS_USED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[[^\]]+\]\s+)?tokens used\b").expect("tokens pattern is valid")
});

static SIDE_CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)\b(?:saved|written|wrote)\b[^\n]*?((?:/|[A-Za-z]:\\)[^\s'"`]+\.(?:md|markdown|txt))"#)
        .expect("side channel pattern is valid")
});

/// Run a CLI assistant and return its answer.
pub async fn run(
    provider: ProviderId,
    program: &str,
    prompt: &str,
    options: &InvokeOptions,
) -> InvocationResult {
    let mut cmd = Command::new(program);
    let stdin_prompt = match provider {
        ProviderId::ClaudeCli => {
            if let Some(model) = &options.model {
                cmd.arg("--model").arg(model);
            }
            cmd.arg("-p").arg(prompt);
            None
        }
        _ => {
            cmd.arg("exec").arg("--skip-git-repo-check");
            if let Some(model) = &options.model {
                cmd.arg("-m").arg(model);
            }
            cmd.arg("-");
            Some(prompt.to_string())
        }
    };

    cmd.stdin(if stdin_prompt.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    tracing::debug!("Spawning {} for {}", program, provider);
    let mut child = cmd.spawn().map_err(|e| spawn_error(program, e))?;

    let writer = match (child.stdin.take(), stdin_prompt) {
        (Some(mut pipe), Some(text)) => Some(tokio::spawn(async move {
            let result = pipe.write_all(text.as_bytes()).await;
            drop(pipe);
            result
        })),
        _ => None,
    };

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(options.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ProviderError::new(
                ErrorKind::Unavailable,
                format!("failed waiting for {}: {}", program, e),
            ));
        }
        Err(_) => {
            if let Some(writer) = writer {
                writer.abort();
            }
            tracing::warn!("{} timed out after {:?}; process killed", program, options.timeout);
            return Err(ProviderError::timeout(options.timeout));
        }
    };

    if let Some(writer) = writer {
        match writer.await {
            Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => {
                tracing::debug!("Writing prompt to {} failed: {}", program, e);
            }
            _ => {}
        }
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        return Err(ProviderError::new(
            ErrorKind::Unavailable,
            if detail.is_empty() {
                format!("{} exited with {}", program, output.status)
            } else {
                format!("{} exited with {}: {}", program, output.status, last_lines(detail, 5))
            },
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = match provider {
        ProviderId::CodexCli => resolve_codex_answer(&stdout).await,
        _ => stdout.trim().to_string(),
    };

    if text.is_empty() {
        return Err(ProviderError::new(
            ErrorKind::Unavailable,
            format!("{} produced no output", program),
        ));
    }

    Ok(text)
}

fn spawn_error(program: &str, err: io::Error) -> ProviderError {
    if err.kind() == io::ErrorKind::NotFound {
        ProviderError::new(ErrorKind::NotFound, format!("{} not found", program))
    } else {
        ProviderError::new(
            ErrorKind::Unavailable,
            format!("failed to start {}: {}", program, err),
        )
    }
}

fn last_lines(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Prefer a reported side-channel file over stdout; the file is removed.
async fn resolve_codex_answer(stdout: &str) -> String {
    if let Some(path) = side_channel_path(stdout) {
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Could not remove {}: {}", path.display(), e);
                }
                let contents = contents.trim();
                if !contents.is_empty() {
                    tracing::debug!("Read codex answer from {}", path.display());
                    return contents.to_string();
                }
            }
            Err(e) => tracing::debug!("Reported file {} unreadable: {}", path.display(), e),
        }
    }
    strip_codex_banner(stdout)
}

/// A file path the output claims to have written the answer to.
///
/// Only files inside the system temp directory are honored, since the file
/// is deleted after reading.
pub fn side_channel_path(output: &str) -> Option<PathBuf> {
    let temp_dir = std::fs::canonicalize(std::env::temp_dir()).ok()?;
    SIDE_CHANNEL
        .captures_iter(output)
        .filter_map(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str()))
        .find(|path| is_temp_file(path, &temp_dir))
}

fn is_temp_file(path: &Path, temp_dir: &Path) -> bool {
    std::fs::canonicalize(path)
        .map(|p| p.is_file() && p.starts_with(temp_dir))
        .unwrap_or(false)
}

/// Remove codex's log banner, keeping only the final answer.
///
/// The answer follows the last `codex` marker line; within it the first
/// markdown heading is taken as the start. Output without a banner is
/// returned trimmed.
pub fn strip_codex_banner(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let has_banner = lines
        .iter()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| BANNER_START.is_match(l.trim()));
    if !has_banner {
        return output.trim().to_string();
    }

    let body_start = lines
        .iter()
        .rposition(|l| ANSWER_MARKER.is_match(l.trim()))
        .map(|i| i + 1)
        .unwrap_or(0);
    let body = &lines[body_start..];
    let body_end = body
        .iter()
        .position(|l| TOKENS_USED.is_match(l.trim()))
        .unwrap_or(body.len());
    let body = &body[..body_end];

    let answer_start = body
        .iter()
        .position(|l| l.trim_start().starts_with("# "))
        .unwrap_or(0);
    body[answer_start..].join("\n").trim().to_string()
}
