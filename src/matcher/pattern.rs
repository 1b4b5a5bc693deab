use regex::Regex;

use super::Specificity;
use crate::cache::{glob_to_regex, RegexCache};

/// Wildcard marker in URL patterns
pub const WILDCARD: char = '*';

/// URL pattern matching mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternMode {
    /// Exact match: "/api/users" matches only "/api/users"
    Exact,
    /// Prefix match: "/api/*" matches "/api" and "/api/users"; "/img*" matches "/images".
    ///
    /// With `boundary`, the prefix must end at a `/` or the end of the path.
    Prefix { prefix: String, boundary: bool },
    /// Wildcard match: "/api/*/items" matches "/api/v1/items"
    Wildcard,
    /// Matches every path ("*", "/*")
    All,
}

/// A compiled URL pattern
#[derive(Debug, Clone)]
pub struct UrlPattern {
    pattern: String,
    mode: PatternMode,
}

impl UrlPattern {
    /// Create a pattern from already-normalized text.
    pub fn new(pattern: &str) -> Self {
        let mode = if !pattern.contains(WILDCARD) {
            PatternMode::Exact
        } else if pattern.ends_with(WILDCARD) {
            let starless = pattern.trim_end_matches(WILDCARD);
            let boundary = starless.ends_with('/');
            let stem = starless.trim_end_matches('/');
            if stem.contains(WILDCARD) {
                PatternMode::Wildcard
            } else if stem.is_empty() {
                PatternMode::All
            } else {
                PatternMode::Prefix {
                    prefix: stem.to_string(),
                    boundary,
                }
            }
        } else {
            PatternMode::Wildcard
        };

        Self {
            pattern: pattern.to_string(),
            mode,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn mode(&self) -> &PatternMode {
        &self.mode
    }

    pub fn has_wildcard(&self) -> bool {
        self.mode != PatternMode::Exact
    }

    /// Check if `path` matches. Wildcard regexes are compiled into `cache`
    /// on first use and reused afterwards.
    pub fn matches(&self, path: &str, cache: &RegexCache) -> bool {
        if self.pattern == path {
            return true;
        }

        match &self.mode {
            PatternMode::Exact => false,
            PatternMode::All => true,
            PatternMode::Prefix { prefix, boundary } => {
                let Some(rest) = path.strip_prefix(prefix.as_str()) else {
                    return false;
                };
                !*boundary || rest.is_empty() || rest.starts_with('/')
            }
            PatternMode::Wildcard => cache
                .get_or_compile(&self.pattern, || Regex::new(&glob_to_regex(&self.pattern, false)))
                .is_ok_and(|re| re.is_match(path)),
        }
    }

    /// Deterministic specificity score of this pattern.
    pub fn specificity(&self) -> Specificity {
        Specificity::of(self)
    }
}
