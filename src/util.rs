use std::env;
use std::io;

/// Delimiter between the instructor name and the appended rating suffix.
/// Everything from the first occurrence on is ours and gets stripped before
/// re-lookup.
pub(crate) const RATING_DELIMITER: &str = " / R:";

/// Placeholder values the host page uses when no instructor is assigned.
const SENTINEL_NAMES: [&str; 2] = ["staff", "tba"];

pub(crate) fn strip_rating_suffix(text: &str) -> &str {
    match text.find(RATING_DELIMITER) {
        Some(idx) => text[..idx].trim(),
        None => text.trim(),
    }
}

pub(crate) fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return true;
    }
    SENTINEL_NAMES
        .iter()
        .any(|s| name.eq_ignore_ascii_case(s))
}

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn env_u64(name: &str, default: u64) -> Result<u64, Box<dyn std::error::Error>> {
    match env_optional(name) {
        Some(value) => Ok(value
            .parse::<u64>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid {name}")))?),
        None => Ok(default),
    }
}

pub(crate) fn env_u32(name: &str, default: u32) -> Result<u32, Box<dyn std::error::Error>> {
    match env_optional(name) {
        Some(value) => Ok(value
            .parse::<u32>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid {name}")))?),
        None => Ok(default),
    }
}

pub(crate) fn env_usize(name: &str, default: usize) -> Result<usize, Box<dyn std::error::Error>> {
    match env_optional(name) {
        Some(value) => Ok(value
            .parse::<usize>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid {name}")))?),
        None => Ok(default),
    }
}

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    match env_optional(name) {
        Some(value) => {
            let v = value.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "y" | "on")
        }
        None => default,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
