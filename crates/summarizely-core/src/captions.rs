use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use reqwest::Url;
use serde::Deserialize;
use tokio::{fs, process::Command};

use crate::{
    error::{Result, SummarizelyError},
    format::upload_date_to_iso,
    transcript::transcript_from_vtt,
    types::Captions,
};

const YT_DLP: &str = "yt-dlp";

/// Fields of `yt-dlp -J` we care about.
#[derive(Debug, Default, Deserialize)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
}

impl VideoInfo {
    pub fn into_captions(self, url: &str, transcript: String) -> Captions {
        Captions {
            video_id: self
                .id
                .or_else(|| youtube_id(url))
                .unwrap_or_else(|| "video".to_string()),
            title: self.title.unwrap_or_else(|| "YouTube Video".to_string()),
            url: url.to_string(),
            transcript,
            channel: self.channel.or(self.uploader),
            published: self.upload_date.as_deref().and_then(upload_date_to_iso),
            duration_sec: self.duration,
            view_count: self.view_count,
            like_count: self.like_count,
        }
    }
}

/// Whether `yt-dlp --version` runs.
pub async fn has_yt_dlp() -> bool {
    Command::new(YT_DLP)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// How to install yt-dlp on this platform.
pub fn install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "brew install yt-dlp"
    } else if cfg!(target_os = "windows") {
        "winget install yt-dlp   # or: choco install yt-dlp"
    } else {
        "pipx install yt-dlp   # or: pip install --user yt-dlp"
    }
}

pub fn is_youtube_url(url: &str) -> bool {
    youtube_id(url).is_some()
}

/// Extract the video id from youtu.be, watch, shorts, embed and live URLs.
pub fn youtube_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.");
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    let id = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts" | "embed" | "live") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    id.filter(|id| !id.is_empty())
}

/// Fetch metadata and English captions for a video.
pub async fn fetch_captions(url: &str) -> Result<Captions> {
    tracing::debug!("Fetching metadata for {}", url);
    let info = fetch_metadata(url).await?;

    let workdir = tempfile::Builder::new().prefix("summarizely-").tempdir()?;
    let vtt_path = download_subtitles(url, workdir.path()).await?;
    let vtt = fs::read_to_string(&vtt_path).await?;

    let transcript = transcript_from_vtt(&vtt);
    if transcript.is_empty() {
        return Err(SummarizelyError::CaptionsUnavailable {
            url: url.to_string(),
            reason: "caption track contains no text".to_string(),
        });
    }
    tracing::debug!("Transcript has {} chars", transcript.chars().count());

    Ok(info.into_captions(url, transcript))
}

async fn fetch_metadata(url: &str) -> Result<VideoInfo> {
    let output = Command::new(YT_DLP)
        .arg("-J")
        .arg(url)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(spawn_error)?;

    if !output.status.success() {
        return Err(SummarizelyError::CaptionsUnavailable {
            url: url.to_string(),
            reason: last_line(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Download a VTT track into `dir`: auto captions first, then manual ones.
async fn download_subtitles(url: &str, dir: &Path) -> Result<PathBuf> {
    let mut reason = String::from("no English captions found");

    for sub_flag in ["--write-auto-sub", "--write-sub"] {
        let output = Command::new(YT_DLP)
            .arg("--skip-download")
            .arg(sub_flag)
            .arg("--sub-lang")
            .arg("en")
            .arg("--sub-format")
            .arg("vtt")
            .arg("-o")
            .arg("%(id)s.%(ext)s")
            .arg(url)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(spawn_error)?;

        if !output.status.success() {
            reason = last_line(&String::from_utf8_lossy(&output.stderr));
            tracing::debug!("yt-dlp {} failed: {}", sub_flag, reason);
            continue;
        }
        if let Some(path) = find_vtt(dir) {
            return Ok(path);
        }
    }

    Err(SummarizelyError::CaptionsUnavailable {
        url: url.to_string(),
        reason,
    })
}

/// First `.vtt` file in a directory, by name.
pub fn find_vtt(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut found: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("vtt")))
        .collect();
    found.sort();
    found.into_iter().next()
}

fn spawn_error(err: std::io::Error) -> SummarizelyError {
    SummarizelyError::ToolFailed {
        tool: YT_DLP.to_string(),
        reason: if err.kind() == std::io::ErrorKind::NotFound {
            "not installed".to_string()
        } else {
            err.to_string()
        },
    }
}

fn last_line(s: &str) -> String {
    s.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp failed")
        .trim()
        .to_string()
}
