//! Param Guard - An allow-list engine for URL query parameters
//!
//! This library decides which query parameters a URL may carry:
//! - Global rules that apply to every path
//! - URL-scoped rules with exact, prefix and wildcard patterns
//! - Most-specific-rule precedence with no fallback to looser rules
//! - Enum, integer range, key-only and callback constraints
//! - Pluggable constraints (range, length, comparison, glob, regex)
//! - Filtering and normalization that keep the original encoding
//! - Lock-protected rule generations, swapped atomically on reload
//!
//! # Example
//!
//! ```rust
//! use param_guard::{Config, ParamGuard};
//!
//! let rules = "
//! # Tracking parameters are fine anywhere
//! utm_source; utm_medium
//!
//! # Pagination on the catalogue
//! /products?page=[range:1-10]&sort=[asc,desc]
//!
//! # Anything goes under the debug tree
//! /debug/*?*
//! ";
//!
//! let guard = ParamGuard::with_default_plugins(Config::default());
//! guard.parse_rules(rules).unwrap();
//!
//! assert!(guard.validate_url("/products?page=2&sort=asc&utm_source=mail"));
//! assert!(!guard.validate_url("/products?page=99"));
//! assert_eq!(
//!     guard.filter_url("/products?page=2&session=abc"),
//!     "/products?page=2"
//! );
//! assert!(guard.validate_url("/debug/trace?verbose=1"));
//! ```
//!
//! # Rule Syntax
//!
//! Rules are groups separated by `;` or newlines:
//! ```text
//! pattern?param&param...     URL-scoped group
//! param&param...             global group
//! ```
//!
//! ## Parameter Specs
//!
//! | Spec | Example | Description |
//! |------|---------|-------------|
//! | Name | `page` | Any value, including none |
//! | Any | `page=[*]` | Any value |
//! | Key only | `debug=[]` | Must have an empty value |
//! | Enum | `sort=[asc,desc]` | Exact, case-sensitive member; `\]` and `\,` escape |
//! | Range | `page=[1-10]` | Inclusive integer range |
//! | Callback | `token=[callback]` | Decided by [`ParamGuard::set_callback`] |
//! | Plugin | `name=[len:3..10]` | Decided by the first plugin accepting the text |
//! | Inverted | `sort!=[random]` | Negates the constraint |
//! | Allow all | `/open/*?*` | Every parameter is accepted; must be alone in its scope |
//!
//! ## URL Patterns
//!
//! - `/api/users` - exact path
//! - `/api/*` - `/api` and everything below it
//! - `/api/*/items` - one or more segments in place of `*`
//! - `*` - every path
//!
//! When several patterns match a path, the most specific one decides each
//! parameter it declares. Other parameters fall through to the most specific
//! matching pattern declaring them, then to the global rules.

pub mod cache;
pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod index;
pub mod matcher;
pub mod parser;
pub mod plugin;
pub mod pool;
pub mod query;
mod scan;
pub mod types;

// Re-export commonly used items
pub use compile::{compile, CompiledRuleSet, PathMasks};
pub use config::{
    Config, DEFAULT_MATCHER_CACHE_SIZE, DEFAULT_MAX_PARAMS, DEFAULT_MAX_RULES_SIZE,
    DEFAULT_MAX_URL_LENGTH, DEFAULT_POOL_SIZE,
};
pub use engine::{ParamGuard, RuleStats};
pub use error::{GuardError, ParseErrorKind, Result};
pub use index::{ParamIndex, ParamMask};
pub use matcher::{PatternMode, Specificity, UrlMatcher, UrlPattern, UrlRule};
pub use parser::{normalize_pattern, parse_rules, parse_rules_from_file};
pub use types::{
    Callback, Constraint, ConstraintKind, ParamRule, RawRules, RawUrlRule, ValuePredicate,
    ALLOW_ALL,
};

// Re-export plugin types
pub use plugin::{
    default_plugins, ComparePlugin, ConstraintPlugin, LengthPlugin, PatternPlugin, PluginError,
    RangePlugin, RegexPlugin,
};
