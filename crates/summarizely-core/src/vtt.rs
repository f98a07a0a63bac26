//! WebVTT cue parsing
//!
//! Turns a caption track into timed cues. Header blocks, NOTE blocks, cue
//! identifiers and anything that is not attached to a valid timing line are
//! ignored rather than treated as errors.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Cue;

static TIMING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{2}:\d{2}[.,]\d{3})\s+-->\s+((?:\d+:)?\d{2}:\d{2}[.,]\d{3})")
        .expect("timing line pattern is valid")
});

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"));

/// Parse a caption track into cues, in source order.
pub fn parse_cues(vtt: &str) -> Vec<Cue> {
    let normalized = vtt.replace('\r', "");
    let lines: Vec<&str> = normalized.lines().collect();
    let mut cues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;
        let Some((start, end)) = parse_timing_line(line) else {
            continue;
        };

        // Auto-generated tracks put a lone space right after the timing line,
        // so only a truly empty line (or the next timing line) ends the cue.
        let mut text_lines = Vec::new();
        while i < lines.len() && !lines[i].is_empty() && parse_timing_line(lines[i].trim()).is_none()
        {
            text_lines.push(lines[i]);
            i += 1;
        }

        if end < start {
            tracing::debug!("Skipping cue with end {:.3} before start {:.3}", end, start);
            continue;
        }

        let text = clean_cue_text(&text_lines.join(" "));
        if !text.is_empty() {
            cues.push(Cue { start, end, text });
        }
    }

    cues
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let caps = TIMING_LINE.captures(line)?;
    let start = parse_timestamp(caps.get(1)?.as_str())?;
    let end = parse_timestamp(caps.get(2)?.as_str())?;
    Some((start, end))
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
pub fn parse_timestamp(ts: &str) -> Option<f64> {
    let ts = ts.replace(',', ".");
    let (clock, millis) = ts.split_once('.')?;
    let millis: u64 = millis.parse().ok()?;

    let parts = clock
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?;
    Some(total as f64 + millis as f64 / 1000.0)
}

fn clean_cue_text(raw: &str) -> String {
    let stripped = MARKUP_TAG.replace_all(raw, "");
    let decoded = decode_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_cues() {
        let sample = "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nHello world\n\n00:00:03.500 --> 00:00:05.000\n<b>Bold</b> text here\n";
        let cues = parse_cues(sample);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start, 1.0);
        assert_eq!(cues[0].end, 3.0);
        assert_eq!(cues[0].text, "Hello world");
        assert_eq!(cues[1].start, 3.5);
        assert_eq!(cues[1].text, "Bold text here");
    }

    #[test]
    fn test_malformed_timing_line_skipped() {
        let sample = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nfirst\n\n00:00:01 --> bad\nlost text\n\n00:00:04.000 --> 00:00:05.000\nthird\n";
        let cues = parse_cues(sample);
        let texts: Vec<_> = cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "third"]);
    }

    #[test]
    fn test_multiline_cue_joined() {
        let sample = "00:00:01.000 --> 00:00:02.000\nline one\n  line   two\n\n";
        let cues = parse_cues(sample);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "line one line two");
    }

    #[test]
    fn test_youtube_auto_caption_markup() {
        let sample = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.160 --> 00:00:02.790 align:start position:0%\n \nso<00:00:00.400><c> today</c><00:00:00.640><c> we</c>\n\n";
        let cues = parse_cues(sample);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "so today we");
        assert!((cues[0].start - 0.16).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_dropped() {
        let sample = "00:00:01.000 --> 00:00:02.000\n<c></c>\n\n00:00:02.000 --> 00:00:03.000\nkept\n";
        let cues = parse_cues(sample);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "kept");
    }

    #[test]
    fn test_crlf_and_identifiers() {
        let sample = "WEBVTT\r\n\r\ncue-1\r\n00:01.000 --> 00:02.500\r\nshort form\r\n\r\n";
        let cues = parse_cues(sample);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].end, 2.5);
        assert_eq!(cues[0].text, "short form");
    }

    #[test]
    fn test_entities_decoded() {
        let sample = "00:00:01.000 --> 00:00:02.000\nTom &amp; Jerry &gt; cats\n";
        let cues = parse_cues(sample);
        assert_eq!(cues[0].text, "Tom & Jerry > cats");
    }

    #[test]
    fn test_end_before_start_skipped() {
        let sample = "00:00:05.000 --> 00:00:02.000\nbackwards\n";
        assert!(parse_cues(sample).is_empty());
    }

    #[test]
    fn test_garbage_input() {
        assert!(parse_cues("").is_empty());
        assert!(parse_cues("not a caption file\nat all").is_empty());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("01:02:03.500"), Some(3723.5));
        assert_eq!(parse_timestamp("02:03.250"), Some(123.25));
        assert_eq!(parse_timestamp("00:61:00.000"), None);
        assert_eq!(parse_timestamp("bad"), None);
    }

    #[test]
    fn test_oversized_hours_skipped() {
        assert_eq!(parse_timestamp("99999999999999999:00:00.000"), None);

        let track = "WEBVTT\n\n99999999999999999:00:00.000 --> 99999999999999999:00:01.000\nboom\n\n00:00:01.000 --> 00:00:02.000\nfine\n";
        let cues = parse_cues(track);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "fine");
    }
}
