#![cfg(unix)]

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use summarizely_core::{Engine, ErrorKind, InvokeOptions, ProviderConfig, ProviderId};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn engine_with(provider: ProviderId, program: &Path) -> Engine {
    let mut config = ProviderConfig::default();
    let program = program.to_string_lossy().into_owned();
    match provider {
        ProviderId::ClaudeCli => config.tools.claude = program,
        _ => config.tools.codex = program,
    }
    Engine::new(config)
}

fn options(timeout: Duration) -> InvokeOptions {
    InvokeOptions {
        model: None,
        timeout,
    }
}

#[tokio::test]
async fn test_missing_binary_is_not_found() {
    let engine = engine_with(ProviderId::ClaudeCli, Path::new("/nonexistent/summarizely-claude"));
    let err = engine
        .invoke(ProviderId::ClaudeCli, "hi", &options(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_claude_receives_prompt_argument() {
    let dir = tempfile::tempdir().unwrap();
    let claude = script(dir.path(), "claude", r##"echo "# Summary of: $2""##);

    let text = engine_with(ProviderId::ClaudeCli, &claude)
        .invoke(ProviderId::ClaudeCli, "the video", &options(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(text, "# Summary of: the video");
}

#[tokio::test]
async fn test_nonzero_exit_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let claude = script(dir.path(), "claude", "echo 'not logged in' >&2\nexit 3");

    let err = engine_with(ProviderId::ClaudeCli, &claude)
        .invoke(ProviderId::ClaudeCli, "hi", &options(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unavailable);
    assert!(err.message.contains("not logged in"));
}

#[tokio::test]
async fn test_empty_output_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let claude = script(dir.path(), "claude", "echo '   '\nexit 0");

    let err = engine_with(ProviderId::ClaudeCli, &claude)
        .invoke(ProviderId::ClaudeCli, "hi", &options(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unavailable);
}

#[tokio::test]
async fn test_timeout_kills_child() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("finished");
    let claude = script(
        dir.path(),
        "claude",
        &format!("sleep 1\ntouch '{}'\necho done", marker.display()),
    );

    let err = engine_with(ProviderId::ClaudeCli, &claude)
        .invoke(ProviderId::ClaudeCli, "hi", &options(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists(), "child kept running after timeout");
}

#[tokio::test]
async fn test_codex_prompt_on_stdin_and_banner_stripped() {
    let dir = tempfile::tempdir().unwrap();
    let codex = script(
        dir.path(),
        "codex",
        r##"prompt=$(cat)
echo "[2025-01-01T00:00:00] OpenAI Codex v0.20.0 (research preview)"
echo "--------"
echo "[2025-01-01T00:00:01] User instructions:"
echo "$prompt"
echo "[2025-01-01T00:00:05] codex"
echo "# Answer to $prompt"
echo ""
echo "Details."
echo "[2025-01-01T00:00:06] tokens used: 42""##,
    );

    let text = engine_with(ProviderId::CodexCli, &codex)
        .invoke(ProviderId::CodexCli, "the question", &options(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(text, "# Answer to the question\n\nDetails.");
}

#[tokio::test]
async fn test_codex_side_channel_file_read_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let answer = std::env::temp_dir().join(format!("summarizely_side_{}.md", std::process::id()));
    let codex = script(
        dir.path(),
        "codex",
        &format!(
            "cat > /dev/null\nprintf '# From file\\n\\nBody\\n' > '{0}'\necho 'OpenAI Codex v0.46.0'\necho 'Summary written to {0}'",
            answer.display()
        ),
    );

    let text = engine_with(ProviderId::CodexCli, &codex)
        .invoke(ProviderId::CodexCli, "hi", &options(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(text, "# From file\n\nBody");
    assert!(!answer.exists());
}
