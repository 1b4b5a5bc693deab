//! The query parameter guard.
//!
//! Exactly one [`CompiledRuleSet`] is live at a time. Readers hold the read
//! lock for a whole call; writers build the next generation off to the side
//! and take the write lock only to swap it in.

use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::compile::{compile, CompiledRuleSet, PathMasks};
use crate::config::Config;
use crate::error::{GuardError, Result};
use crate::parser::{normalize_pattern, parse_rules};
use crate::plugin::{default_plugins, ConstraintPlugin};
use crate::pool::BufferPool;
use crate::query::{
    decode_component, segments, split_url, strip_fragment, strip_fragment_bytes, QuerySegments,
};
use crate::types::{Callback, ParamRule, RawRules};

/// Counters describing the live generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleStats {
    pub generation: u64,
    pub global_params: usize,
    pub url_rules: usize,
    /// Distinct parameter names across all scopes
    pub indexed_params: usize,
    /// Wildcard matchers compiled so far in this generation
    pub cached_matchers: usize,
}

struct Live {
    rules: Arc<CompiledRuleSet>,
    callback: Option<Callback>,
}

/// Allow-list engine for URL query parameters.
///
/// # Example
///
/// ```rust
/// use param_guard::{Config, ParamGuard};
///
/// let guard = ParamGuard::with_default_plugins(Config::default());
/// guard.parse_rules("/products?page=[range:1-10]; utm_source").unwrap();
///
/// assert!(guard.validate_url("/products?page=5"));
/// assert!(!guard.validate_url("/products?page=15"));
/// assert_eq!(guard.filter_url("/products?page=5&ref=x"), "/products?page=5");
/// ```
pub struct ParamGuard {
    config: Config,
    live: RwLock<Live>,
    /// Raw rules behind the live generation. Locked for the whole of every
    /// rebuild, which serializes writers.
    staged: Mutex<RawRules>,
    plugins: RwLock<Vec<Arc<dyn ConstraintPlugin>>>,
    initial_plugins: Vec<Arc<dyn ConstraintPlugin>>,
    initialized: AtomicBool,
    generation: AtomicU64,
    pool: BufferPool,
}

impl std::fmt::Debug for ParamGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamGuard")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("plugins", &self.plugin_names())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Default for ParamGuard {
    fn default() -> Self {
        Self::with_default_plugins(Config::default())
    }
}

impl ParamGuard {
    /// Create a guard with no plugins and no rules. Every query with
    /// parameters is rejected until rules are loaded.
    pub fn new(config: Config) -> Self {
        Self::with_plugins(config, Vec::new())
    }

    /// Create a guard with the built-in plugins registered.
    pub fn with_default_plugins(config: Config) -> Self {
        Self::with_plugins(config, default_plugins())
    }

    /// Create a guard with the given plugins, consulted in order.
    pub fn with_plugins(config: Config, plugins: Vec<Arc<dyn ConstraintPlugin>>) -> Self {
        let pool = BufferPool::new(config.pool_size);
        Self {
            config,
            live: RwLock::new(Live {
                rules: Arc::new(CompiledRuleSet::empty(0)),
                callback: None,
            }),
            staged: Mutex::new(RawRules::new()),
            plugins: RwLock::new(plugins.clone()),
            initial_plugins: plugins,
            initialized: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// False once [`close`](Self::close) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(GuardError::Closed)
        }
    }

    // ---- rule loading ----

    /// Replace every rule with the rules in `text`.
    ///
    /// On error the live rules are left untouched.
    pub fn parse_rules(&self, text: &str) -> Result<()> {
        self.ensure_open()?;
        if text.len() > self.config.max_rules_size {
            let err = GuardError::RulesTooLarge {
                size: text.len(),
                limit: self.config.max_rules_size,
            };
            self.rejected(&err);
            return Err(err);
        }

        let plugins = self.plugins.read().clone();
        let parsed = match parse_rules(text, &plugins) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.rejected(&err);
                return Err(err);
            }
        };

        self.rebuild(move |raw| {
            *raw = parsed;
            Ok(())
        })
        .inspect_err(|err| self.rejected(err))
    }

    /// Replace every rule with the rules in a file.
    pub fn load_rules_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_open()?;
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        if size > self.config.max_rules_size as u64 {
            let err = GuardError::RulesTooLarge {
                size: usize::try_from(size).unwrap_or(usize::MAX),
                limit: self.config.max_rules_size,
            };
            self.rejected(&err);
            return Err(err);
        }
        let text = std::fs::read_to_string(path)?;
        self.parse_rules(&text)
    }

    /// Add or replace a global parameter rule.
    pub fn add_global_param(&self, rule: ParamRule) -> Result<()> {
        self.rebuild(move |raw| {
            raw.insert_global(rule);
            Ok(())
        })
    }

    /// Add parameter rules to a URL pattern, merging with any rules already
    /// declared for it.
    pub fn add_url_rule(&self, pattern: &str, params: Vec<ParamRule>) -> Result<()> {
        if pattern.trim().is_empty() {
            return Err(GuardError::InvalidRule("empty URL pattern".to_string()));
        }
        let pattern = normalize_pattern(pattern);
        self.rebuild(move |raw| {
            raw.insert_url_rule(pattern, params);
            Ok(())
        })
    }

    /// Set the predicate used by `callback` rules.
    pub fn set_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.live.write().callback = Some(Arc::new(callback));
        Ok(())
    }

    /// Drop every rule. Plugins and the callback are kept.
    pub fn clear(&self) -> Result<()> {
        self.rebuild(|raw| {
            *raw = RawRules::new();
            Ok(())
        })
    }

    /// Drop every rule and the callback, and restore the plugins given at
    /// construction.
    pub fn reset(&self) -> Result<()> {
        self.ensure_open()?;
        let mut staged = self.staged.lock();
        self.ensure_open()?;
        *self.plugins.write() = self.initial_plugins.clone();
        let generation = self.generation.load(Ordering::Acquire) + 1;
        {
            let mut live = self.live.write();
            live.rules = Arc::new(CompiledRuleSet::empty(generation));
            live.callback = None;
        }
        self.generation.store(generation, Ordering::Release);
        *staged = RawRules::new();
        debug!(generation, "guard reset");
        Ok(())
    }

    /// Shut the guard down.
    ///
    /// Rules are dropped and every plugin is closed. The first plugin error
    /// is returned after all plugins have been given the chance to close.
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut staged = self.staged.lock();
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let generation = self.generation.load(Ordering::Acquire) + 1;
        {
            let mut live = self.live.write();
            live.rules = Arc::new(CompiledRuleSet::empty(generation));
            live.callback = None;
        }
        self.generation.store(generation, Ordering::Release);
        *staged = RawRules::new();

        let mut first_err = None;
        for plugin in self.plugins.read().iter() {
            if let Err(e) = plugin.close() {
                warn!(plugin = plugin.name(), error = %e, "plugin failed to close");
                first_err.get_or_insert(GuardError::PluginClose {
                    plugin: plugin.name().to_string(),
                    message: e.to_string(),
                });
            }
        }
        info!(generation, "param guard closed");
        first_err.map_or(Ok(()), Err)
    }

    /// Apply `mutate` to a copy of the staged rules, compile it and publish
    /// the result. Nothing changes if either step fails.
    fn rebuild<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut RawRules) -> Result<()>,
    {
        self.ensure_open()?;
        let mut staged = self.staged.lock();
        // close() may have won the race for the lock
        self.ensure_open()?;

        let mut next = staged.clone();
        mutate(&mut next)?;
        let generation = self.generation.load(Ordering::Acquire) + 1;
        let compiled = compile(&next, self.config.matcher_cache_size, generation)?;

        debug!(
            generation,
            globals = compiled.global_count(),
            url_rules = compiled.url_rule_count(),
            params = compiled.index().len(),
            "publishing rule generation"
        );
        self.live.write().rules = Arc::new(compiled);
        self.generation.store(generation, Ordering::Release);
        *staged = next;
        Ok(())
    }

    fn rejected(&self, err: &GuardError) {
        warn!(
            generation = self.generation.load(Ordering::Acquire),
            error = %err,
            "rule reload rejected, keeping current rules"
        );
    }

    // ---- plugins ----

    /// Append a plugin. It applies to rules parsed after this call.
    pub fn register_plugin(&self, plugin: Arc<dyn ConstraintPlugin>) -> Result<()> {
        self.ensure_open()?;
        self.plugins.write().push(plugin);
        Ok(())
    }

    /// Names of the registered plugins, in consultation order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Name of the first plugin claiming `constraint`.
    pub fn plugin_for(&self, constraint: &str) -> Option<String> {
        self.plugins
            .read()
            .iter()
            .find(|p| p.can_parse(constraint))
            .map(|p| p.name().to_string())
    }

    // ---- introspection ----

    /// The live generation.
    pub fn snapshot(&self) -> Arc<CompiledRuleSet> {
        Arc::clone(&self.live.read().rules)
    }

    pub fn stats(&self) -> RuleStats {
        let live = self.live.read();
        let rules = &live.rules;
        RuleStats {
            generation: rules.generation(),
            global_params: rules.global_count(),
            url_rules: rules.url_rule_count(),
            indexed_params: rules.index().len(),
            cached_matchers: rules.matcher().cached_matchers(),
        }
    }

    // ---- validation ----

    /// Check every parameter of `url` against the rules for its path.
    /// A URL without a query string is valid.
    pub fn validate_url(&self, url: &str) -> bool {
        if !self.is_initialized() {
            return false;
        }
        if url.len() > self.config.max_url_length {
            return false;
        }
        let (path, query, _) = split_url(url);
        match query {
            Some(query) => {
                let live = self.live.read();
                self.check_query(&live, path, query)
            }
            None => true,
        }
    }

    /// Check a query string (without `?`) against the rules for `path`.
    /// A `#` ends the query, as it does in a URL.
    pub fn validate_query(&self, path: &str, query: &str) -> bool {
        if !self.is_initialized() {
            return false;
        }
        if query.is_empty() {
            return true;
        }
        if !self.within_length(path, query.len()) {
            return false;
        }
        let live = self.live.read();
        self.check_query(&live, path, strip_fragment(query))
    }

    /// [`validate_query`](Self::validate_query) over raw bytes. Names and
    /// values are compared as written; nothing is percent-decoded.
    pub fn validate_query_bytes(&self, path: &str, query: &[u8]) -> bool {
        if !self.is_initialized() {
            return false;
        }
        if query.is_empty() {
            return true;
        }
        if !self.within_length(path, query.len()) {
            return false;
        }
        let query = strip_fragment_bytes(query);
        if query.is_empty() {
            return true;
        }

        let live = self.live.read();
        let rules = &live.rules;
        let path = match_path(path);
        let masks = rules.masks_for(path);
        if masks.combined.is_empty() {
            return false;
        }
        if rules.allows_all(&masks) {
            return true;
        }

        for (count, seg) in QuerySegments::new(query).enumerate() {
            if count >= self.config.max_params {
                debug!(limit = self.config.max_params, "query parameter limit reached");
                return false;
            }
            let Some(slot) = rules.index().get_index_bytes(query, seg.start, seg.key_end) else {
                return false;
            };
            let Ok(value) = std::str::from_utf8(seg.value(query)) else {
                return false;
            };
            match rules.resolve_slot(&masks, path, slot) {
                Some(rule) if rule.evaluate(value, live.callback.as_ref()) => {}
                _ => return false,
            }
        }
        true
    }

    /// Check a single decoded parameter against the rules for `path`.
    pub fn validate_param(&self, path: &str, name: &str, value: &str) -> bool {
        if !self.is_initialized() {
            return false;
        }
        let live = self.live.read();
        let rules = &live.rules;
        let path = match_path(path);
        let masks = rules.masks_for(path);
        if rules.allows_all(&masks) {
            return true;
        }
        rules
            .resolve(&masks, path, name)
            .is_some_and(|rule| rule.evaluate(value, live.callback.as_ref()))
    }

    fn within_length(&self, path: &str, query_len: usize) -> bool {
        path.len() + 1 + query_len <= self.config.max_url_length
    }

    fn check_query(&self, live: &Live, path: &str, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        if !self.within_length(path, query.len()) {
            return false;
        }

        let rules = &live.rules;
        let path = match_path(path);
        let masks = rules.masks_for(path);
        if masks.combined.is_empty() {
            return false;
        }
        if rules.allows_all(&masks) {
            return true;
        }

        for (count, seg) in segments(query).enumerate() {
            if count >= self.config.max_params {
                debug!(limit = self.config.max_params, "query parameter limit reached");
                return false;
            }
            if !permitted(rules, &masks, path, seg.key, seg.value, live.callback.as_ref()) {
                return false;
            }
        }
        true
    }

    // ---- filtering ----

    /// Remove disallowed parameters from `url`, keeping any fragment.
    pub fn filter_url(&self, url: &str) -> String {
        self.rewrite_url(url, true)
    }

    /// Remove disallowed parameters from a query string (without `?`).
    /// Kept segments retain their original encoding and order.
    pub fn filter_query_params(&self, path: &str, query: &str) -> String {
        if !self.is_initialized() || !self.within_length(path, query.len()) {
            return String::new();
        }
        let live = self.live.read();
        self.filter_query(&live, path, strip_fragment(query)).into_owned()
    }

    /// Canonical form of `url`: disallowed parameters and the fragment are
    /// dropped, and a query left empty takes its `?` with it. A URL without
    /// a query string is returned unchanged.
    pub fn normalize_url(&self, url: &str) -> String {
        self.rewrite_url(url, false)
    }

    fn rewrite_url(&self, url: &str, keep_fragment: bool) -> String {
        let (path, query, fragment) = split_url(url);
        let Some(query) = query else {
            return url.to_string();
        };
        if !self.is_initialized() || url.len() > self.config.max_url_length {
            return path.to_string();
        }

        let live = self.live.read();
        let filtered = self.filter_query(&live, path, query);
        let mut out = String::with_capacity(url.len());
        out.push_str(path);
        if !filtered.is_empty() {
            out.push('?');
            out.push_str(&filtered);
        }
        if keep_fragment {
            if let Some(fragment) = fragment {
                out.push_str(fragment);
            }
        }
        out
    }

    fn filter_query<'q>(&self, live: &Live, path: &str, query: &'q str) -> Cow<'q, str> {
        if query.is_empty() || !self.within_length(path, query.len()) {
            return Cow::Borrowed("");
        }

        let rules = &live.rules;
        let path = match_path(path);
        let masks = rules.masks_for(path);
        if masks.combined.is_empty() {
            return Cow::Borrowed("");
        }
        if rules.allows_all(&masks) {
            return Cow::Borrowed(query);
        }

        let mut buf = self.pool.get();
        for (count, seg) in segments(query).enumerate() {
            if count >= self.config.max_params {
                debug!(limit = self.config.max_params, "query parameter limit reached");
                return Cow::Borrowed("");
            }
            if permitted(rules, &masks, path, seg.key, seg.value, live.callback.as_ref()) {
                if !buf.is_empty() {
                    buf.push('&');
                }
                buf.push_str(seg.raw);
            }
        }
        Cow::Owned(buf.as_str().to_owned())
    }
}

/// Paths are matched as given; only the empty path maps to the root.
fn match_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn permitted(
    rules: &CompiledRuleSet,
    masks: &PathMasks<'_>,
    path: &str,
    raw_key: &str,
    raw_value: &str,
    callback: Option<&Callback>,
) -> bool {
    let (Some(key), Some(value)) = (decode_component(raw_key), decode_component(raw_value)) else {
        return false;
    };
    rules
        .resolve(masks, path, &key)
        .is_some_and(|rule| rule.evaluate(&value, callback))
}
