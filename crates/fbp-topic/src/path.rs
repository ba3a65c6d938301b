//! Topic path parsing, length bounds, and reserved-suffix classification.

use fbp_value::{FbpError, Result};

/// Maximum length, in bytes, of a single path segment.
pub const MAX_SEGMENT_LEN: usize = 32;

/// Maximum length, in bytes, of a full topic path.
pub const MAX_PATH_LEN: usize = 64;

/// Characters reserved for suffix use; a bare segment may not contain them
/// except as the final character, where they change the meaning of the path.
pub const RESERVED_CHARS: [char; 10] = ['?', '#', '$', '\'', '"', '\\', '`', '&', '@', '%'];

/// What a publish/subscribe path means once its reserved trailing character
/// (if any) is accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    /// No reserved trailing character: an ordinary value topic.
    Normal,
    /// Trailing `$`: metadata publish or request on `base`.
    Meta,
    /// Trailing `#`: error notification on `base`.
    Error,
    /// Trailing `?`: reserved query, currently a no-op.
    Query,
}

/// Split `path` into its base (with any reserved trailing character removed)
/// and the [`Suffix`] that character implies.
#[must_use]
pub fn classify(path: &str) -> (&str, Suffix) {
    match path.chars().last() {
        Some('$') => (&path[..path.len() - 1], Suffix::Meta),
        Some('#') => (&path[..path.len() - 1], Suffix::Error),
        Some('?') => (&path[..path.len() - 1], Suffix::Query),
        _ => (path, Suffix::Normal),
    }
}

/// Validate overall path length and split into `/`-delimited segments,
/// rejecting any segment (other than an empty trailing one from a terminal
/// `/`) that exceeds [`MAX_SEGMENT_LEN`].
pub fn segments(path: &str) -> Result<Vec<&str>> {
    if path.len() > MAX_PATH_LEN {
        return Err(FbpError::InvalidParameter(format!(
            "topic path {path:?} exceeds max length {MAX_PATH_LEN}"
        )));
    }
    let mut out = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() {
            continue;
        }
        if seg.len() > MAX_SEGMENT_LEN {
            return Err(FbpError::InvalidParameter(format!(
                "topic segment {seg:?} exceeds max length {MAX_SEGMENT_LEN}"
            )));
        }
        out.push(seg);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_strips_known_reserved_suffixes() {
        assert_eq!(classify("h/en$"), ("h/en", Suffix::Meta));
        assert_eq!(classify("h/en#"), ("h/en", Suffix::Error));
        assert_eq!(classify("h/en?"), ("h/en", Suffix::Query));
        assert_eq!(classify("h/en"), ("h/en", Suffix::Normal));
        assert_eq!(classify("$"), ("", Suffix::Meta));
    }

    #[test]
    fn segments_splits_and_ignores_empty_boundary_segments() {
        assert_eq!(segments("h/en/x").unwrap(), vec!["h", "en", "x"]);
        assert_eq!(segments("/h/en/").unwrap(), vec!["h", "en"]);
        assert_eq!(segments("").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn segments_rejects_oversized_segment() {
        let long = "a".repeat(MAX_SEGMENT_LEN + 1);
        let err = segments(&long).unwrap_err();
        assert!(matches!(err, FbpError::InvalidParameter(_)));
    }

    #[test]
    fn segments_rejects_oversized_path() {
        let long = format!("h/{}", "a".repeat(MAX_PATH_LEN));
        let err = segments(&long).unwrap_err();
        assert!(matches!(err, FbpError::InvalidParameter(_)));
    }

    #[test]
    fn max_length_path_is_accepted() {
        let exact = "a".repeat(MAX_PATH_LEN);
        assert!(segments(&exact).is_ok());
    }
}
