use serde::{Deserialize, Serialize};

/// A timed caption entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Normalized captions for one video plus the metadata yt-dlp reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Captions {
    pub title: String,
    pub video_id: String,
    pub url: String,
    /// Plain, time-free transcript.
    pub transcript: String,
    pub channel: Option<String>,
    /// ISO date (YYYY-MM-DD).
    pub published: Option<String>,
    pub duration_sec: Option<f64>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
}

/// Sidecar written next to every saved summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub url: String,
    pub video_id: String,
    pub title: String,
    pub created_at: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
