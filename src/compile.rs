use std::sync::Arc;

use crate::error::{GuardError, Result};
use crate::index::{ParamIndex, ParamMask};
use crate::matcher::{UrlMatcher, UrlRule};
use crate::types::{Constraint, ParamRule, RawRules, ALLOW_ALL};

/// Masks computed for one request path
#[derive(Debug, Clone)]
pub struct PathMasks<'a> {
    /// Slots of all global rules
    pub global: ParamMask,
    /// Union of slots declared by every matching URL rule
    pub url: ParamMask,
    /// Slots declared by the most specific matching URL rule
    pub specific: ParamMask,
    /// `global | url | specific`
    pub combined: ParamMask,
    /// The most specific matching URL rule
    pub specific_rule: Option<&'a UrlRule>,
}

/// One immutable, fully built generation of rules
#[derive(Debug)]
pub struct CompiledRuleSet {
    generation: u64,
    index: ParamIndex,
    globals: Vec<Option<Arc<ParamRule>>>,
    global_mask: ParamMask,
    global_count: usize,
    matcher: UrlMatcher,
    allow_all: Option<usize>,
}

impl CompiledRuleSet {
    /// A generation with no rules at all.
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            index: ParamIndex::new(),
            globals: Vec::new(),
            global_mask: ParamMask::new(0),
            global_count: 0,
            matcher: UrlMatcher::new(Vec::new(), 1),
            allow_all: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn index(&self) -> &ParamIndex {
        &self.index
    }

    pub fn matcher(&self) -> &UrlMatcher {
        &self.matcher
    }

    pub fn global_mask(&self) -> &ParamMask {
        &self.global_mask
    }

    /// The global rule at `slot`, if any.
    pub fn global_at(&self, slot: usize) -> Option<&ParamRule> {
        self.globals.get(slot)?.as_deref()
    }

    /// Slot of the allow-all sentinel, if any scope declares it.
    pub fn allow_all_slot(&self) -> Option<usize> {
        self.allow_all
    }

    pub fn global_count(&self) -> usize {
        self.global_count
    }

    pub fn url_rule_count(&self) -> usize {
        self.matcher.rule_count()
    }

    pub fn is_empty(&self) -> bool {
        self.global_count == 0 && self.matcher.rule_count() == 0
    }

    /// Compute the global, URL, most-specific and combined masks for `path`.
    pub fn masks_for<'a>(&'a self, path: &str) -> PathMasks<'a> {
        let width = self.index.len();
        let mut url = ParamMask::new(width);
        let mut specific = ParamMask::new(width);
        let mut specific_rule = None;

        for rule in self.matcher.matching(path) {
            if specific_rule.is_none() {
                specific.union_with(&rule.mask);
                specific_rule = Some(rule);
            }
            url.union_with(&rule.mask);
        }

        let mut combined = self.global_mask.clone();
        combined.union_with(&url);
        combined.union_with(&specific);

        PathMasks {
            global: self.global_mask.clone(),
            url,
            specific,
            combined,
            specific_rule,
        }
    }

    /// Whether the allow-all sentinel is in effect for these masks.
    pub fn allows_all(&self, masks: &PathMasks<'_>) -> bool {
        self.allow_all.is_some_and(|slot| masks.combined.get(slot))
    }

    /// Pick the single rule governing `name` on `path`.
    ///
    /// Precedence: the most specific matching URL rule, then the most specific
    /// matching URL rule declaring `name`, then the global rule. A name claimed
    /// at a higher level never falls back to a lower one.
    pub fn resolve<'a>(&'a self, masks: &PathMasks<'a>, path: &str, name: &str) -> Option<&'a ParamRule> {
        let slot = self.index.get_index(name)?;
        self.resolve_slot(masks, path, slot)
    }

    /// [`resolve`](Self::resolve) for an already-interned slot.
    pub fn resolve_slot<'a>(&'a self, masks: &PathMasks<'a>, path: &str, slot: usize) -> Option<&'a ParamRule> {
        if masks.specific.get(slot) {
            return masks.specific_rule?.rule_at(slot);
        }
        if masks.url.get(slot) {
            return self
                .matcher
                .most_specific_declaring(path, slot)?
                .rule_at(slot);
        }
        if masks.global.get(slot) {
            return self.global_at(slot);
        }
        None
    }
}

fn check_rule(rule: &ParamRule) -> Result<()> {
    if rule.name.trim().is_empty() {
        return Err(GuardError::InvalidRule("empty parameter name".to_string()));
    }
    if let Constraint::Range { min, max } = rule.constraint {
        if min > max {
            return Err(GuardError::InvalidRule(format!(
                "invalid range for '{}': {} > {}",
                rule.name, min, max
            )));
        }
    }
    Ok(())
}

/// The allow-all sentinel may only be the sole rule of a scope.
fn check_scope(params: &[ParamRule], scope: &str) -> Result<()> {
    if params.len() > 1 && params.iter().any(ParamRule::is_allow_all) {
        return Err(GuardError::InvalidRule(format!(
            "'{}' mixed with other parameters in {}",
            ALLOW_ALL, scope
        )));
    }
    Ok(())
}

/// Compile raw rules into a new generation.
///
/// Every parameter name is interned first so all masks share one width.
pub fn compile(raw: &RawRules, matcher_cache_size: usize, generation: u64) -> Result<CompiledRuleSet> {
    let mut index = ParamIndex::new();

    check_scope(&raw.globals, "global rules")?;
    for rule in &raw.globals {
        check_rule(rule)?;
        index.get_or_create_index(&rule.name);
    }
    for url_rule in &raw.url_rules {
        if url_rule.pattern.trim().is_empty() {
            return Err(GuardError::InvalidRule("empty URL pattern".to_string()));
        }
        check_scope(&url_rule.params, &url_rule.pattern)?;
        for rule in &url_rule.params {
            check_rule(rule)?;
            index.get_or_create_index(&rule.name);
        }
    }

    let width = index.len();
    let mut globals = vec![None; width];
    let mut global_mask = ParamMask::new(width);
    for rule in &raw.globals {
        if let Some(slot) = index.get_index(&rule.name) {
            global_mask.set(slot);
            globals[slot] = Some(Arc::new(rule.clone()));
        }
    }

    let url_rules = raw
        .url_rules
        .iter()
        .map(|r| UrlRule::new(&r.pattern, &r.params, &index))
        .collect();

    let allow_all = index.get_index(ALLOW_ALL);

    Ok(CompiledRuleSet {
        generation,
        index,
        globals,
        global_mask,
        global_count: raw.globals.len(),
        matcher: UrlMatcher::new(url_rules, matcher_cache_size),
        allow_all,
    })
}
