//! Encoding for `_/topic/list`: a unit-separator (0x1F) joined set of prefixes.

const UNIT_SEPARATOR: char = '\u{1f}';

#[must_use]
pub fn encode(prefixes: &[String]) -> String {
    prefixes.join(&UNIT_SEPARATOR.to_string())
}

#[must_use]
pub fn decode(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(UNIT_SEPARATOR).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn round_trips_as_a_set() {
        let prefixes = vec!["h/".to_string(), "c/".to_string(), "d/".to_string()];
        let encoded = encode(&prefixes);
        let decoded = decode(&encoded);
        let a: HashSet<_> = prefixes.into_iter().collect();
        let b: HashSet<_> = decoded.into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_list_round_trips() {
        assert_eq!(decode(&encode(&[])), Vec::<String>::new());
    }
}
