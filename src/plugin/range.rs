use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{strip_namespace, ConstraintPlugin, PluginError};
use crate::types::ValuePredicate;

/// Signed integer bounds joined by a single `-`
static BOUNDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?\d+)\s*-\s*([+-]?\d+)$").expect("BOUNDS_PATTERN: hardcoded regex is invalid")
});

/// Whether `body` has the `MIN-MAX` integer shape, regardless of overflow.
pub(crate) fn looks_like_bounds(body: &str) -> bool {
    BOUNDS_PATTERN.is_match(body)
}

/// Parse `MIN-MAX` into inclusive integer bounds.
pub(crate) fn parse_bounds(body: &str) -> Option<(i64, i64)> {
    let captures = BOUNDS_PATTERN.captures(body)?;
    let min = captures.get(1)?.as_str().parse::<i64>().ok()?;
    let max = captures.get(2)?.as_str().parse::<i64>().ok()?;
    Some((min, max))
}

/// `range:MIN-MAX` - value must be an integer within inclusive bounds
#[derive(Debug, Clone, Copy, Default)]
pub struct RangePlugin;

impl ConstraintPlugin for RangePlugin {
    fn name(&self) -> &str {
        "range"
    }

    fn can_parse(&self, constraint: &str) -> bool {
        constraint.starts_with("range:")
    }

    fn parse(&self, _param: &str, constraint: &str) -> Result<ValuePredicate, PluginError> {
        let body = strip_namespace(constraint, "range:").ok_or(PluginError::NotApplicable)?;
        let (min, max) = parse_bounds(body)
            .ok_or_else(|| PluginError::Malformed(format!("invalid range bounds: {}", body)))?;
        if min > max {
            return Err(PluginError::Malformed(format!(
                "invalid range: {} > {}",
                min, max
            )));
        }
        Ok(Arc::new(move |value: &str| {
            value.parse::<i64>().is_ok_and(|n| min <= n && n <= max)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_pattern_regex_compiles() {
        assert!(BOUNDS_PATTERN.is_match("1-10"));
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_bounds("1-10"), Some((1, 10)));
        assert_eq!(parse_bounds("-5--1"), Some((-5, -1)));
        assert_eq!(parse_bounds("1 - 3"), Some((1, 3)));
        assert_eq!(parse_bounds("1-"), None);
        assert_eq!(parse_bounds("a-b"), None);
        assert_eq!(parse_bounds("1-2-3"), None);
        assert!(looks_like_bounds("99999999999999999999-1"));
        assert_eq!(parse_bounds("99999999999999999999-1"), None);
    }

    #[test]
    fn test_range_predicate() {
        let pred = RangePlugin.parse("page", "range:1-10").unwrap();
        assert!(pred("1"));
        assert!(pred("5"));
        assert!(pred("10"));
        assert!(!pred("0"));
        assert!(!pred("15"));
        assert!(!pred("five"));
    }

    #[test]
    fn test_range_not_applicable_outside_namespace() {
        assert_eq!(
            RangePlugin.parse("page", "1-10").err(),
            Some(PluginError::NotApplicable)
        );
        assert!(!RangePlugin.can_parse("len:1..2"));
    }

    #[test]
    fn test_range_malformed() {
        assert!(matches!(
            RangePlugin.parse("page", "range:10-1"),
            Err(PluginError::Malformed(_))
        ));
        assert!(matches!(
            RangePlugin.parse("page", "range:abc"),
            Err(PluginError::Malformed(_))
        ));
    }
}
