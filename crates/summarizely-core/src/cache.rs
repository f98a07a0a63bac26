use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs;

use crate::{
    error::Result,
    format::{iso_compact, sanitize_title},
    types::{Captions, RunMetadata},
};

pub const DEFAULT_OUTPUT_DIR: &str = "summaries";
pub const SUMMARY_FILE: &str = "summary_full.md";
pub const TRANSCRIPT_FILE: &str = "transcript.txt";
pub const METADATA_FILE: &str = "metadata.json";
pub const LATEST_DIR: &str = "_latest";

/// Directory for one run: `<output>/<ISO stamp>_<Title>`
pub fn summary_dir(output_dir: &Path, title: &str, at: DateTime<Utc>) -> PathBuf {
    let title = sanitize_title(title);
    let title = if title.is_empty() { "video" } else { title.as_str() };
    output_dir.join(format!("{}_{}", iso_compact(at), title))
}

/// A previous run of the same video found under the output directory.
#[derive(Debug, Clone)]
pub struct CachedRun {
    pub dir: PathBuf,
    pub metadata: RunMetadata,
    pub summary: Option<String>,
    pub transcript: Option<String>,
}

impl CachedRun {
    /// Whether the stored summary can stand in for a new one.
    pub fn summary_matches(&self, provider: &str, model: Option<&str>) -> bool {
        self.summary.is_some()
            && self.transcript.is_some()
            && self.metadata.provider == provider
            && model.is_none_or(|m| self.metadata.model.as_deref() == Some(m))
    }
}

/// Find the newest run whose metadata names `video_id`.
pub fn find_cached(output_dir: &Path, video_id: &str) -> Option<CachedRun> {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return None;
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n != LATEST_DIR && n.contains('_'))
        })
        .collect();
    // Stamps sort chronologically; newest first.
    dirs.sort_by(|a, b| b.cmp(a));

    for dir in dirs {
        let Ok(raw) = std::fs::read_to_string(dir.join(METADATA_FILE)) else {
            continue;
        };
        let metadata: RunMetadata = match serde_json::from_str(&raw) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", dir.display(), e);
                continue;
            }
        };
        if metadata.video_id != video_id {
            continue;
        }

        tracing::debug!("Found previous run for {} in {}", video_id, dir.display());
        return Some(CachedRun {
            summary: std::fs::read_to_string(dir.join(SUMMARY_FILE)).ok(),
            transcript: std::fs::read_to_string(dir.join(TRANSCRIPT_FILE)).ok(),
            dir,
            metadata,
        });
    }
    None
}

/// Metadata for a run created now.
pub fn run_metadata(
    captions: &Captions,
    provider: &str,
    model: Option<&str>,
    at: DateTime<Utc>,
) -> RunMetadata {
    RunMetadata {
        url: captions.url.clone(),
        video_id: captions.video_id.clone(),
        title: captions.title.clone(),
        created_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        provider: provider.to_string(),
        model: model.map(str::to_string),
    }
}

/// Write a run's files and refresh `_latest`. Returns the run directory.
pub async fn save_run(
    output_dir: &Path,
    captions: &Captions,
    summary: &str,
    metadata: &RunMetadata,
    save_transcript: bool,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    let dir = summary_dir(output_dir, &captions.title, at);
    fs::create_dir_all(&dir).await?;

    let mut written = Vec::new();

    fs::write(dir.join(SUMMARY_FILE), summary).await?;
    written.push(SUMMARY_FILE);

    if save_transcript {
        fs::write(dir.join(TRANSCRIPT_FILE), captions.transcript.trim()).await?;
        written.push(TRANSCRIPT_FILE);
    }

    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(dir.join(METADATA_FILE), json).await?;
    written.push(METADATA_FILE);

    refresh_latest(output_dir, &dir, &written).await?;
    Ok(dir)
}

/// Replace `_latest` with copies of the given files from `run_dir`.
async fn refresh_latest(output_dir: &Path, run_dir: &Path, files: &[&str]) -> Result<()> {
    let latest = output_dir.join(LATEST_DIR);
    if fs::try_exists(&latest).await? {
        fs::remove_dir_all(&latest).await?;
    }
    fs::create_dir_all(&latest).await?;
    for name in files {
        fs::copy(run_dir.join(name), latest.join(name)).await?;
    }
    Ok(())
}
