use std::sync::Arc;

use regex::Regex;

use super::{strip_namespace, ConstraintPlugin, PluginError};
use crate::cache::{glob_to_regex, RegexCache};
use crate::error::Result;
use crate::types::ValuePredicate;

/// `pattern:GLOB` - value must match a wildcard pattern.
///
/// `*` matches any sequence and `?` matches one character.
#[derive(Debug)]
pub struct PatternPlugin {
    cache: RegexCache,
}

impl PatternPlugin {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: RegexCache::new(cache_size),
        }
    }

    /// Number of compiled patterns currently cached.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl ConstraintPlugin for PatternPlugin {
    fn name(&self) -> &str {
        "pattern"
    }

    fn can_parse(&self, constraint: &str) -> bool {
        constraint.starts_with("pattern:")
    }

    fn parse(&self, _param: &str, constraint: &str) -> std::result::Result<ValuePredicate, PluginError> {
        let glob = strip_namespace(constraint, "pattern:").ok_or(PluginError::NotApplicable)?;
        if glob.is_empty() {
            return Err(PluginError::Malformed("empty pattern".to_string()));
        }
        let re = self
            .cache
            .get_or_compile(glob, || Regex::new(&glob_to_regex(glob, true)))
            .map_err(|e| PluginError::Malformed(e.to_string()))?;
        Ok(Arc::new(move |value: &str| re.is_match(value)))
    }

    fn close(&self) -> Result<()> {
        self.cache.clear();
        Ok(())
    }
}
