use std::sync::Arc;

use super::{strip_namespace, ConstraintPlugin, PluginError};
use crate::types::ValuePredicate;

/// `len:MIN..MAX` - value length in characters within inclusive bounds.
///
/// Also accepts `len:..MAX`, `len:MIN..` and `len:N` (exact length).
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthPlugin;

fn parse_len(body: &str, part: &str) -> Result<usize, PluginError> {
    part.trim()
        .parse::<usize>()
        .map_err(|_| PluginError::Malformed(format!("invalid length bounds: {}", body)))
}

impl ConstraintPlugin for LengthPlugin {
    fn name(&self) -> &str {
        "length"
    }

    fn can_parse(&self, constraint: &str) -> bool {
        constraint.starts_with("len:")
    }

    fn parse(&self, _param: &str, constraint: &str) -> Result<ValuePredicate, PluginError> {
        let body = strip_namespace(constraint, "len:").ok_or(PluginError::NotApplicable)?;

        let (min, max) = match body.split_once("..") {
            Some((lo, hi)) => {
                let min = if lo.trim().is_empty() {
                    0
                } else {
                    parse_len(body, lo)?
                };
                let max = if hi.trim().is_empty() {
                    usize::MAX
                } else {
                    parse_len(body, hi)?
                };
                (min, max)
            }
            None => {
                let exact = parse_len(body, body)?;
                (exact, exact)
            }
        };

        if min > max {
            return Err(PluginError::Malformed(format!(
                "invalid length range: {} > {}",
                min, max
            )));
        }

        Ok(Arc::new(move |value: &str| {
            let len = value.chars().count();
            min <= len && len <= max
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        let pred = LengthPlugin.parse("username", "len:3..10").unwrap();
        assert!(pred("john"));
        assert!(pred("abc"));
        assert!(pred("abcdefghij"));
        assert!(!pred("jo"));
        assert!(!pred("abcdefghijk"));
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let pred = LengthPlugin.parse("name", "len:..3").unwrap();
        assert!(pred("äöü"));
        assert!(!pred("äöüß"));
    }

    #[test]
    fn test_length_open_and_exact() {
        let min_only = LengthPlugin.parse("q", "len:2..").unwrap();
        assert!(min_only("ab"));
        assert!(!min_only("a"));

        let exact = LengthPlugin.parse("code", "len:4").unwrap();
        assert!(exact("abcd"));
        assert!(!exact("abc"));
    }

    #[test]
    fn test_length_malformed() {
        for bad in ["len:constraint", "len:5..2", "len:a..b", "len:", "len:1..2..3"] {
            assert!(
                matches!(LengthPlugin.parse("x", bad), Err(PluginError::Malformed(_))),
                "{} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn test_length_not_applicable() {
        assert_eq!(
            LengthPlugin.parse("x", "range:1-2").err(),
            Some(PluginError::NotApplicable)
        );
    }
}
