//! Human-readable size parsing (e.g., "256MB", "2GB").

use thiserror::Error;

const KB: usize = 1024;
const MB: usize = KB * 1024;
const GB: usize = MB * 1024;
const TB: usize = GB * 1024;

/// Longest suffixes first so "MB" wins over "B".
const UNITS: [(&str, usize); 9] = [
    ("TB", TB),
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("T", TB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '256MB', '2GB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Accepts a whole number with an optional binary suffix (`B`, `K`/`KB`,
/// `M`/`MB`, `G`/`GB`, `T`/`TB`), case-insensitive, with optional
/// whitespace before the suffix.
///
/// # Examples
///
/// ```
/// use rastercache::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("256mb").unwrap(), 256 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|rest| (rest.trim_end(), *multiplier))
        })
        .unwrap_or((upper.as_str(), 1));

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SizeParseError::new(trimmed));
    }

    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| SizeParseError::new(trimmed))
}

/// Format a byte count using the largest unit that divides it exactly.
///
/// ```
/// use rastercache::config::format_size;
///
/// assert_eq!(format_size(256 * 1024 * 1024), "256MB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: usize) -> String {
    for (suffix, unit) in [("TB", TB), ("GB", GB), ("MB", MB), ("KB", KB)] {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_number() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("512B").unwrap(), 512);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_size("1KB").unwrap(), KB);
        assert_eq!(parse_size("1k").unwrap(), KB);
        assert_eq!(parse_size("100MB").unwrap(), 100 * MB);
        assert_eq!(parse_size("2g").unwrap(), 2 * GB);
        assert_eq!(parse_size("1TB").unwrap(), TB);
    }

    #[test]
    fn test_parse_whitespace() {
        assert_eq!(parse_size("  2GB  ").unwrap(), 2 * GB);
        assert_eq!(parse_size("500 MB").unwrap(), 500 * MB);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("-1GB").is_err());
        assert!(parse_size("+1GB").is_err());
        assert!(parse_size("1.5GB").is_err());
        assert!(parse_size("2PB").is_err());
    }

    #[test]
    fn test_parse_overflow() {
        let err = parse_size("99999999999999999999TB").unwrap_err();
        assert!(err.to_string().contains("99999999999999999999TB"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(KB), "1KB");
        assert_eq!(format_size(100 * MB), "100MB");
        assert_eq!(format_size(2 * GB), "2GB");
        assert_eq!(format_size(1536), "1536");
        assert_eq!(format_size(0), "0");
    }

    #[test]
    fn test_format_then_parse() {
        for bytes in [KB, 256 * MB, 3 * GB] {
            assert_eq!(parse_size(&format_size(bytes)).unwrap(), bytes);
        }
    }
}
