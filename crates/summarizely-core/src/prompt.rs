use chrono::{DateTime, SecondsFormat, Utc};

use crate::{
    format::{format_compact_number, format_duration},
    types::Captions,
};

/// Transcript cap applied to command-line assistants unless disabled.
pub const DEFAULT_CLI_MAX_CHARS: usize = 80_000;

const STYLE_GUIDE: &str = "\
Write a vivid, free-flowing Markdown summary that follows the video's narrative from start to finish.
Base everything on the transcript and let the speaker's flow decide the structure.

Style:
- Short, rhythmic sentences with no filler.
- Chronological by default; compress repetition and tighten rambling passages.
- Use formatting where it helps: micro-headings, short bullets, callouts, pull quotes.
- Keep concrete specifics (names, numbers, terms, examples) where they come up.
- Bold key phrases. Do not add timestamps.
- End with a short \"Highlights\" section and, optionally, a few \"Takeaways\".";

/// Build the summary prompt for a video.
///
/// The transcript is whitespace-collapsed and, with `max_chars`, cut to that
/// many characters with a note saying so.
pub fn build_prompt(captions: &Captions, max_chars: Option<usize>) -> String {
    build_prompt_at(captions, max_chars, Utc::now())
}

pub fn build_prompt_at(
    captions: &Captions,
    max_chars: Option<usize>,
    generated: DateTime<Utc>,
) -> String {
    let mut transcript = collapse_whitespace(&captions.transcript);
    let mut note = String::new();
    if let Some(max) = max_chars {
        if let Some((idx, _)) = transcript.char_indices().nth(max) {
            transcript.truncate(idx);
            note = format!(
                "\n\n(Note: transcript truncated to {} characters for processing.)",
                group_thousands(max)
            );
        }
    }

    format!(
        "Title: {title}\nURL: {url}\n\n{guide}\n\nStart your answer with this exact metadata block:\n{header}\nNow write the summary.{note}\n\nTranscript:\n{transcript}",
        title = captions.title,
        url = captions.url,
        guide = STYLE_GUIDE,
        header = metadata_header(captions, generated),
    )
}

/// Markdown block the model is asked to reproduce verbatim.
pub fn metadata_header(captions: &Captions, generated: DateTime<Utc>) -> String {
    let mut lines = vec![format!("# {}", captions.title), String::new()];
    lines.push(format!("**URL:** {}  ", captions.url));
    if let Some(channel) = &captions.channel {
        lines.push(format!("**Channel:** {}  ", channel));
    }
    if let Some(published) = &captions.published {
        lines.push(format!("**Published:** {}  ", published));
    }
    if let Some(duration) = captions.duration_sec {
        lines.push(format!("**Duration:** {}  ", format_duration(duration)));
    }
    if let Some(views) = captions.view_count {
        lines.push(format!("**Views:** {}  ", format_compact_number(views)));
    }
    if let Some(likes) = captions.like_count {
        lines.push(format!("**Likes:** {}  ", format_compact_number(likes)));
    }
    lines.push("**Summary Type:** Full  ".to_string());
    lines.push(format!(
        "**Generated:** {}",
        generated.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    lines.push("\n---\n".to_string());
    lines.join("\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
