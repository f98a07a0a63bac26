//! Summarizely Core Library
//!
//! Turns a YouTube caption track into a clean transcript and hands it to
//! whichever summarization backend is available: a CLI assistant (claude,
//! codex), a local Ollama server, or a hosted API.

pub mod cache;
pub mod captions;
pub mod config;
pub mod error;
pub mod format;
pub mod invoke;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod transcript;
pub mod types;
pub mod vtt;

// Re-export commonly used items at crate root
pub use cache::{CachedRun, find_cached, run_metadata, save_run};
pub use captions::{fetch_captions, has_yt_dlp, install_hint, is_youtube_url, youtube_id};
pub use config::ProviderConfig;
pub use error::{ErrorKind, ProviderError, Result, SummarizelyError};
pub use invoke::{Engine, InvocationResult, InvokeOptions};
pub use prompt::{DEFAULT_CLI_MAX_CHARS, build_prompt};
pub use provider::{
    NoProviderAvailable, ProviderDescriptor, ProviderId, SystemProbe, ToolProbe, describe_failure,
    select_provider,
};
pub use retry::{RetryPolicy, RetryReport, retry};
pub use transcript::{normalize, transcript_from_vtt};
pub use types::{Captions, Cue, RunMetadata};
pub use vtt::parse_cues;
