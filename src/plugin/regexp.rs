use std::sync::Arc;

use regex::RegexBuilder;

use super::{strip_namespace, ConstraintPlugin, PluginError};
use crate::cache::RegexCache;
use crate::error::Result;
use crate::types::ValuePredicate;

/// Compiled program size cap for user-supplied expressions
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// `regex:EXPR` - value must fully match `EXPR`
#[derive(Debug)]
pub struct RegexPlugin {
    cache: RegexCache,
}

impl RegexPlugin {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: RegexCache::new(cache_size),
        }
    }

    /// Number of compiled expressions currently cached.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl ConstraintPlugin for RegexPlugin {
    fn name(&self) -> &str {
        "regex"
    }

    fn can_parse(&self, constraint: &str) -> bool {
        constraint.starts_with("regex:")
    }

    fn parse(&self, _param: &str, constraint: &str) -> std::result::Result<ValuePredicate, PluginError> {
        let expr = strip_namespace(constraint, "regex:").ok_or(PluginError::NotApplicable)?;
        if expr.is_empty() {
            return Err(PluginError::Malformed("empty regex".to_string()));
        }
        let re = self
            .cache
            .get_or_compile(expr, || {
                RegexBuilder::new(&format!("^(?:{})$", expr))
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
            })
            .map_err(|e| PluginError::Malformed(e.to_string()))?;
        Ok(Arc::new(move |value: &str| re.is_match(value)))
    }

    fn close(&self) -> Result<()> {
        self.cache.clear();
        Ok(())
    }
}
