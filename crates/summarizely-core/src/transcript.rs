//! Transcript normalization
//!
//! Rolling caption tracks repeat the tail of the previous cue at the start of
//! the next one. The normalizer folds cues into one string and drops that
//! repeated text as it goes, so no separate deduplication pass is needed.

use crate::{types::Cue, vtt::parse_cues};

/// Overlap search limits. Heuristic; tuned for auto-generated tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapWindow {
    /// Longest character overlap considered.
    pub max_chars: usize,
    /// Shortest character overlap accepted.
    pub min_chars: usize,
    /// Longest word run compared when no character overlap is found.
    pub max_words: usize,
}

impl Default for OverlapWindow {
    fn default() -> Self {
        Self {
            max_chars: 100,
            min_chars: 10,
            max_words: 4,
        }
    }
}

/// Fold cues into a single deduplicated transcript.
///
/// An empty cue list yields an empty string.
pub fn normalize(cues: &[Cue]) -> String {
    normalize_with(cues, OverlapWindow::default())
}

pub fn normalize_with(cues: &[Cue], window: OverlapWindow) -> String {
    normalize_texts(cues.iter().map(|c| c.text.as_str()), window)
}

/// Parse a caption track and normalize it in one step.
pub fn transcript_from_vtt(vtt: &str) -> String {
    normalize(&parse_cues(vtt))
}

fn normalize_texts<'a>(texts: impl Iterator<Item = &'a str>, window: OverlapWindow) -> String {
    let mut transcript = String::new();

    for text in texts {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if transcript.is_empty() {
            transcript.push_str(text);
            continue;
        }

        let remainder = match char_overlap(&transcript, text, &window) {
            Some(len) => skip_chars(text, len),
            None => match word_overlap(&transcript, text, window.max_words) {
                Some(words) => skip_words(text, words),
                None => text,
            },
        };

        let remainder = remainder.trim();
        if !remainder.is_empty() {
            transcript.push(' ');
            transcript.push_str(remainder);
        }
    }

    transcript.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length in chars of the longest transcript suffix that is also a prefix of
/// `incoming`, ignoring case.
fn char_overlap(transcript: &str, incoming: &str, window: &OverlapWindow) -> Option<usize> {
    let mut tail: Vec<char> = transcript.chars().rev().take(window.max_chars).collect();
    tail.reverse();
    let head: Vec<char> = incoming.chars().take(window.max_chars).collect();

    let longest = tail.len().min(head.len());
    if longest < window.min_chars.max(1) {
        return None;
    }

    (window.min_chars.max(1)..=longest)
        .rev()
        .find(|&len| chars_eq_ignore_case(&tail[tail.len() - len..], &head[..len]))
}

/// Number of leading words of `incoming` that repeat the transcript's last
/// words, ignoring case.
fn word_overlap(transcript: &str, incoming: &str, max_words: usize) -> Option<usize> {
    let tail: Vec<&str> = transcript.split_whitespace().rev().take(max_words).collect();
    let head: Vec<&str> = incoming.split_whitespace().take(max_words).collect();

    (1..=tail.len().min(head.len())).rev().find(|&k| {
        tail[..k]
            .iter()
            .rev()
            .zip(&head[..k])
            .all(|(a, b)| a.to_lowercase() == b.to_lowercase())
    })
}

fn chars_eq_ignore_case(a: &[char], b: &[char]) -> bool {
    a.iter()
        .zip(b)
        .all(|(x, y)| x == y || x.to_lowercase().eq(y.to_lowercase()))
}

fn skip_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

fn skip_words(s: &str, n: usize) -> &str {
    let mut rest = s.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues(texts: &[&str]) -> Vec<Cue> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Cue {
                start: i as f64,
                end: i as f64 + 1.0,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_word_overlap_collapsed() {
        let out = normalize(&cues(&["the quick brown fox", "brown fox jumps over"]));
        assert_eq!(out, "the quick brown fox jumps over");
    }

    #[test]
    fn test_char_overlap_collapsed() {
        let out = normalize(&cues(&[
            "welcome back to the channel everyone",
            "To The Channel everyone today we talk",
        ]));
        assert_eq!(out, "welcome back to the channel everyone today we talk");
    }

    #[test]
    fn test_repeated_cue_dropped() {
        let out = normalize(&cues(&[
            "so this is the first line",
            "so this is the first line",
            "so this is the first line and then more",
        ]));
        assert_eq!(out, "so this is the first line and then more");
    }

    #[test]
    fn test_no_overlap_appends() {
        let out = normalize(&cues(&["hello there", "general kenobi"]));
        assert_eq!(out, "hello there general kenobi");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(&[]), "");
        assert_eq!(transcript_from_vtt(""), "");
        assert_eq!(transcript_from_vtt("WEBVTT\n\nno cues here"), "");
    }

    #[test]
    fn test_idempotent() {
        let out = normalize(&cues(&[
            "and the   reason we do this",
            "reason we do this is simple",
            "it keeps things fast",
        ]));
        let again = normalize(&cues(&[out.as_str()]));
        assert_eq!(again, out);
    }

    #[test]
    fn test_distinct_words_preserved() {
        let texts = ["alpha beta gamma", "delta epsilon", "zeta eta theta", "iota kappa"];
        let input = cues(&texts);
        let out = normalize(&input);
        for word in texts.iter().flat_map(|t| t.split_whitespace()) {
            assert!(out.split_whitespace().any(|w| w == word), "missing {word}");
        }
        let total: usize = texts.iter().map(|t| t.len()).sum();
        assert!(out.len() <= total + texts.len() - 1);
    }

    #[test]
    fn test_overlap_below_floor_uses_words() {
        let window = OverlapWindow {
            max_chars: 100,
            min_chars: 10,
            max_words: 1,
        };
        // "fox" is too short for the character pass, single word pass catches it.
        let out = normalize_with(&cues(&["quick fox", "fox runs"]), window);
        assert_eq!(out, "quick fox runs");
    }

    #[test]
    fn test_multibyte_text() {
        let out = normalize(&cues(&["ça va très bien merci", "très bien merci et toi"]));
        assert_eq!(out, "ça va très bien merci et toi");
    }

    #[test]
    fn test_vtt_end_to_end() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nthe quick brown fox\n\n00:00:02.000 --> 00:00:03.000\nbrown fox jumps over\n";
        assert_eq!(transcript_from_vtt(vtt), "the quick brown fox jumps over");
    }
}
