use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Matches either a quoted segment ("a.b") or a run of characters up to the next dot,
    // mirroring pyhocon's `ConfigTree.parse_key` pattern.
    static ref KEY_SEGMENT_PATTERN: Regex = Regex::new(r#""[^"]+"|[^.]+"#).unwrap();
}

/// Splits a dotted key path into its segments, honoring double-quoted segments that may
/// themselves contain dots (e.g. `"a.b".c` -> ["a.b", "c"]).
pub fn parse_key(key: &str) -> Vec<String> {
    KEY_SEGMENT_PATTERN
        .find_iter(key)
        .map(|m| {
            let s = m.as_str();

            if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
                s[1..s.len() - 1].to_string()
            } else {
                s.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_simple_path() {
        assert_eq!(parse_key("a.b.c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted_segment_with_dot() {
        assert_eq!(parse_key(r#""a.b".c"#), vec!["a.b", "c"]);
    }

    #[test]
    fn test_single_segment() {
        assert_eq!(parse_key("foo"), vec!["foo"]);
    }
}
