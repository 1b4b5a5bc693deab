use std::fmt;
use std::sync::Arc;

use crate::guard::guarded;

/// Reserved parameter name meaning "accept every parameter" for its scope.
pub const ALLOW_ALL: &str = "*";

/// Predicate compiled by a plugin from its constraint text.
pub type ValuePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Caller-supplied predicate for `Callback` rules: `(name, raw_value) -> accepted`.
pub type Callback = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Constraint placed on a parameter's value
#[derive(Clone)]
pub enum Constraint {
    /// Value must be empty (`name=[]`)
    KeyOnly,
    /// Any value, including empty (`name` or `name=[*]`)
    Any,
    /// Exact, case-sensitive membership (`name=[a,b,c]`)
    Enum(Vec<String>),
    /// Inclusive signed integer bounds (`name=[1-10]`)
    Range { min: i64, max: i64 },
    /// Deferred to the engine's callback (`name=[callback]`)
    Callback,
    /// Predicate produced by the plugin that accepted `source`
    Plugin {
        plugin: String,
        source: String,
        predicate: ValuePredicate,
    },
}

/// Tag of a [`Constraint`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    KeyOnly,
    Any,
    Enum,
    Range,
    Callback,
    Plugin,
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::KeyOnly => ConstraintKind::KeyOnly,
            Constraint::Any => ConstraintKind::Any,
            Constraint::Enum(_) => ConstraintKind::Enum,
            Constraint::Range { .. } => ConstraintKind::Range,
            Constraint::Callback => ConstraintKind::Callback,
            Constraint::Plugin { .. } => ConstraintKind::Plugin,
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::KeyOnly => f.write_str("KeyOnly"),
            Constraint::Any => f.write_str("Any"),
            Constraint::Enum(values) => f.debug_tuple("Enum").field(values).finish(),
            Constraint::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Constraint::Callback => f.write_str("Callback"),
            Constraint::Plugin { plugin, source, .. } => f
                .debug_struct("Plugin")
                .field("plugin", plugin)
                .field("source", source)
                .finish_non_exhaustive(),
        }
    }
}

/// A rule governing one query parameter
#[derive(Debug, Clone)]
pub struct ParamRule {
    /// Parameter name (decoded form)
    pub name: String,
    /// Value constraint
    pub constraint: Constraint,
    /// Negate the constraint's result
    pub inverted: bool,
}

impl ParamRule {
    pub fn new(name: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            name: name.into(),
            constraint,
            inverted: false,
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, Constraint::Any)
    }

    pub fn key_only(name: impl Into<String>) -> Self {
        Self::new(name, Constraint::KeyOnly)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            Constraint::Enum(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn range(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self::new(name, Constraint::Range { min, max })
    }

    pub fn callback(name: impl Into<String>) -> Self {
        Self::new(name, Constraint::Callback)
    }

    /// The allow-all sentinel rule. It must be the only rule of its scope.
    pub fn allow_all() -> Self {
        Self::any(ALLOW_ALL)
    }

    /// Mark this rule as inverted.
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn is_allow_all(&self) -> bool {
        self.name == ALLOW_ALL
    }

    /// Evaluate a value against this rule.
    ///
    /// Callbacks and plugin predicates run inside [`guarded`], so a panic
    /// counts as a rejection before inversion is applied.
    pub fn evaluate(&self, value: &str, callback: Option<&Callback>) -> bool {
        let base = match &self.constraint {
            Constraint::KeyOnly => value.is_empty(),
            Constraint::Any => true,
            Constraint::Enum(values) => values.iter().any(|v| v == value),
            Constraint::Range { min, max } => value
                .parse::<i64>()
                .is_ok_and(|n| *min <= n && n <= *max),
            Constraint::Callback => match callback {
                Some(cb) => guarded(&self.name, || cb(&self.name, value)),
                None => false,
            },
            Constraint::Plugin { predicate, .. } => guarded(&self.name, || predicate(value)),
        };
        base != self.inverted
    }
}

/// Parameter rules declared for one URL pattern, before compilation
#[derive(Debug, Clone)]
pub struct RawUrlRule {
    /// Normalized URL pattern
    pub pattern: String,
    /// Declared parameters, unique by name
    pub params: Vec<ParamRule>,
}

/// Uncompiled rule maps produced by the parser or by programmatic additions
#[derive(Debug, Clone, Default)]
pub struct RawRules {
    /// Global parameter rules, unique by name
    pub globals: Vec<ParamRule>,
    /// URL-scoped rules, unique by pattern
    pub url_rules: Vec<RawUrlRule>,
}

impl RawRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global rule, replacing any previous rule with the same name.
    pub fn insert_global(&mut self, rule: ParamRule) {
        upsert(&mut self.globals, rule);
    }

    /// Add parameters to a URL pattern, merging with an existing group for the same pattern.
    pub fn insert_url_rule(&mut self, pattern: impl Into<String>, params: Vec<ParamRule>) {
        let pattern = pattern.into();
        let pos = match self.url_rules.iter().position(|r| r.pattern == pattern) {
            Some(pos) => pos,
            None => {
                self.url_rules.push(RawUrlRule {
                    pattern,
                    params: Vec::new(),
                });
                self.url_rules.len() - 1
            }
        };
        let group = &mut self.url_rules[pos];
        for rule in params {
            upsert(&mut group.params, rule);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.url_rules.is_empty()
    }
}

fn upsert(rules: &mut Vec<ParamRule>, rule: ParamRule) {
    match rules.iter_mut().find(|r| r.name == rule.name) {
        Some(existing) => *existing = rule,
        None => rules.push(rule),
    }
}
