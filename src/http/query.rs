//! Query-string parsing.
//!
//! Splits a raw query string on `&`, each fragment on the first `=`, and
//! percent/form-decodes both sides. Duplicate keys keep the last value, per the
//! resolved "duplicate query keys" question this library's contract answers
//! explicitly rather than leaving ambiguous.

use crate::http::path::percent_decode_form;
use std::collections::HashMap;

/// Parses a raw (already-split-off, `?`-stripped) query string into a last-write-wins
/// map of decoded key/value pairs.
pub(crate) fn parse(raw: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if raw.is_empty() {
        return map;
    }

    for fragment in raw.split('&') {
        if fragment.is_empty() {
            continue;
        }
        let (key, value) = match fragment.split_once('=') {
            Some((k, v)) => (k, v),
            None => (fragment, ""),
        };
        let key = String::from_utf8_lossy(&percent_decode_form(key.as_bytes())).into_owned();
        let value = String::from_utf8_lossy(&percent_decode_form(value.as_bytes())).into_owned();
        map.insert(key, value);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let map = parse("a=1&b=2");
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn last_value_wins_on_duplicate_keys() {
        let map = parse("a=1&a=2&a=3");
        assert_eq!(map.get("a").map(String::as_str), Some("3"));
    }

    #[test]
    fn missing_equals_yields_empty_value() {
        let map = parse("flag");
        assert_eq!(map.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn decodes_plus_and_percent_escapes() {
        let map = parse("q=hello+world&name=caf%C3%A9");
        assert_eq!(map.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(map.get("name").map(String::as_str), Some("café"));
    }

    #[test]
    fn empty_query_yields_empty_map() {
        assert!(parse("").is_empty());
    }
}
