//! URL rule storage and pattern matching.

mod pattern;
mod specificity;

pub use pattern::{PatternMode, UrlPattern, WILDCARD};
pub use specificity::Specificity;

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::RegexCache;
use crate::index::{ParamIndex, ParamMask};
use crate::types::ParamRule;

/// Parameter rules bound to one URL pattern, compiled against a [`ParamIndex`]
#[derive(Debug, Clone)]
pub struct UrlRule {
    /// The URL pattern
    pub pattern: UrlPattern,
    /// Rules by parameter name
    pub params: HashMap<String, Arc<ParamRule>>,
    /// Slots of every declared parameter
    pub mask: ParamMask,
    /// Cached specificity of `pattern`
    pub specificity: Specificity,
    /// Rules by slot, for lookups without hashing names
    slots: Vec<Option<Arc<ParamRule>>>,
}

impl UrlRule {
    /// Build a rule whose parameter names are already interned in `index`.
    /// Names missing from `index` are skipped.
    pub fn new(pattern: &str, params: &[ParamRule], index: &ParamIndex) -> Self {
        let pattern = UrlPattern::new(pattern);
        let specificity = pattern.specificity();
        let mut mask = ParamMask::new(index.len());
        let mut slots = vec![None; index.len()];
        let mut by_name = HashMap::with_capacity(params.len());

        for rule in params {
            let Some(idx) = index.get_index(&rule.name) else {
                continue;
            };
            let rule = Arc::new(rule.clone());
            mask.set(idx);
            slots[idx] = Some(Arc::clone(&rule));
            by_name.insert(rule.name.clone(), rule);
        }

        Self {
            pattern,
            params: by_name,
            mask,
            specificity,
            slots,
        }
    }

    /// The rule declared at `slot`, if any.
    pub fn rule_at(&self, slot: usize) -> Option<&ParamRule> {
        self.slots.get(slot)?.as_deref()
    }

    /// The rule declared for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ParamRule> {
        self.params.get(name).map(Arc::as_ref)
    }
}

/// URL rules ordered from most to least specific, plus a bounded cache of
/// compiled wildcard matchers scoped to this generation
#[derive(Debug)]
pub struct UrlMatcher {
    rules: Vec<UrlRule>,
    cache: RegexCache,
}

impl UrlMatcher {
    /// Create a matcher. Rules are sorted by descending specificity; equal
    /// scores fall back to pattern text so the order is total.
    pub fn new(mut rules: Vec<UrlRule>, cache_size: usize) -> Self {
        rules.sort_by(|a, b| {
            b.specificity
                .cmp(&a.specificity)
                .then_with(|| a.pattern.as_str().cmp(b.pattern.as_str()))
        });
        Self {
            rules,
            cache: RegexCache::new(cache_size),
        }
    }

    /// All rules, most specific first.
    pub fn rules(&self) -> &[UrlRule] {
        &self.rules
    }

    /// Check if `pattern` matches `path`.
    pub fn matches(&self, pattern: &UrlPattern, path: &str) -> bool {
        pattern.matches(path, &self.cache)
    }

    /// Rules matching `path`, most specific first.
    pub fn matching<'a, 'p>(&'a self, path: &'p str) -> impl Iterator<Item = &'a UrlRule> + use<'a, 'p> {
        self.rules
            .iter()
            .filter(move |rule| rule.pattern.matches(path, &self.cache))
    }

    /// The single most specific rule matching `path`.
    pub fn most_specific(&self, path: &str) -> Option<&UrlRule> {
        self.matching(path).next()
    }

    /// The most specific rule matching `path` that declares `slot`.
    pub fn most_specific_declaring(&self, path: &str, slot: usize) -> Option<&UrlRule> {
        self.rules
            .iter()
            .filter(|rule| rule.mask.get(slot))
            .find(|rule| rule.pattern.matches(path, &self.cache))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Number of compiled wildcard matchers currently cached.
    pub fn cached_matchers(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
