use crate::options::ImageFormat;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use url::Url;

/// Replaces characters that are unsafe in file names.
pub fn sanitize_filename(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '&' | '=' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    cleaned.trim_matches('_').to_string()
}

/// File name derived from the captured URL, e.g.
/// `https://example.com/pricing` with PNG becomes `example.com_pricing.png`.
pub fn output_filename(url: &str, format: ImageFormat) -> PathBuf {
    let stem = match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            sanitize_filename(&format!("{host}{}", parsed.path()))
        }
        Err(_) => sanitize_filename(url),
    };

    let stem = if stem.is_empty() { "screenshot".to_string() } else { stem };
    PathBuf::from(format!("{stem}.{}", format.extension()))
}

/// Human-readable byte count.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

/// Parses an RFC 3339 timestamp given on the command line.
pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}
