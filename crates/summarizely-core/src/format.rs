use chrono::{DateTime, Utc};

/// Format seconds as M:SS, or H:MM:SS for an hour or more
pub fn format_duration(total_seconds: f64) -> String {
    let s = total_seconds.max(0.0) as u64;
    let hours = s / 3600;
    let mins = (s % 3600) / 60;
    let secs = s % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Format a count as 999, 1.2K, 3.4M or 1B
pub fn format_compact_number(n: u64) -> String {
    let trim = |x: f64| {
        let s = format!("{:.1}", x);
        s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
    };
    match n {
        1_000_000_000.. => format!("{}B", trim(n as f64 / 1e9)),
        1_000_000.. => format!("{}M", trim(n as f64 / 1e6)),
        1_000.. => format!("{}K", trim(n as f64 / 1e3)),
        _ => n.to_string(),
    }
}

/// ISO-8601 timestamp safe for file names: 2024-05-01T12-30-00Z
pub fn iso_compact(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%SZ").to_string()
}

/// Reduce a title to `[A-Za-z0-9_]`, at most 120 chars
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').chars().take(120).collect()
}

/// yt-dlp reports upload dates as YYYYMMDD
pub fn upload_date_to_iso(date: &str) -> Option<String> {
    if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &date[..4], &date[4..6], &date[6..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(75.9), "1:15");
        assert_eq!(format_duration(3725.0), "1:02:05");
        assert_eq!(format_duration(-3.0), "0:00");
    }

    #[test]
    fn test_format_compact_number() {
        assert_eq!(format_compact_number(999), "999");
        assert_eq!(format_compact_number(1_000), "1K");
        assert_eq!(format_compact_number(1_240), "1.2K");
        assert_eq!(format_compact_number(3_400_000), "3.4M");
        assert_eq!(format_compact_number(2_000_000_000), "2B");
    }

    #[test]
    fn test_iso_compact() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(iso_compact(at), "2024-05-01T12-30-00Z");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Rust: The Good Parts!"), "Rust_The_Good_Parts");
        assert_eq!(sanitize_title("  ***  "), "");
        assert_eq!(sanitize_title(&"a".repeat(200)).len(), 120);
    }

    #[test]
    fn test_upload_date() {
        assert_eq!(upload_date_to_iso("20240102").as_deref(), Some("2024-01-02"));
        assert_eq!(upload_date_to_iso("2024"), None);
    }
}
