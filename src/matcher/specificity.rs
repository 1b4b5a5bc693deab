use std::cmp::Reverse;

use super::pattern::{PatternMode, UrlPattern, WILDCARD};

/// Ranks how precisely a URL pattern targets a path.
///
/// Fields compare in declaration order, greater is more specific:
/// literal patterns beat any wildcard pattern; then fewer wildcards; then
/// an infix wildcard beats a trailing (prefix-style) one; then more path
/// segments; then a longer literal part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    literal: bool,
    wildcards: Reverse<usize>,
    infix: bool,
    segments: usize,
    literal_len: usize,
}

impl Specificity {
    pub fn of(pattern: &UrlPattern) -> Self {
        let text = pattern.as_str();
        let wildcards = text.chars().filter(|&c| c == WILDCARD).count();
        Self {
            literal: wildcards == 0,
            wildcards: Reverse(wildcards),
            infix: *pattern.mode() == PatternMode::Wildcard,
            segments: text.split('/').filter(|s| !s.is_empty()).count(),
            literal_len: text.len() - wildcards,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    pub fn wildcards(&self) -> usize {
        self.wildcards.0
    }

    pub fn segments(&self) -> usize {
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(p: &str) -> Specificity {
        UrlPattern::new(p).specificity()
    }

    #[test]
    fn test_literal_beats_wildcard() {
        assert!(spec("/api/users") > spec("/api/*"));
        assert!(spec("/a") > spec("/a/b/c/d/*/e"));
    }

    #[test]
    fn test_fewer_wildcards_win() {
        assert!(spec("/a/*/c/d") > spec("/a/*/*/d"));
    }

    #[test]
    fn test_infix_beats_trailing() {
        assert!(spec("/api/*/items") > spec("/api/items/*"));
    }

    #[test]
    fn test_more_segments_win() {
        assert!(spec("/api/v1/*") > spec("/api/*"));
        assert!(spec("/a/b/c") > spec("/abcdefgh"));
    }

    #[test]
    fn test_longer_literal_breaks_ties() {
        assert!(spec("/api/users/*") > spec("/api/user/*"));
        assert_eq!(spec("/api/aaaa/*"), spec("/api/bbbb/*"));
    }

    #[test]
    fn test_all_wildcard_is_least_specific() {
        assert!(spec("/*") < spec("/a/*"));
        assert!(spec("*") < spec("/a*"));
    }

    #[test]
    fn test_accessors() {
        let s = spec("/a/*/b/*");
        assert!(!s.is_literal());
        assert_eq!(s.wildcards(), 2);
        assert_eq!(s.segments(), 4);
    }
}
