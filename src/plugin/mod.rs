//! Constraint plugins.
//!
//! A plugin turns constraint text it recognizes (e.g. `len:3..10`) into a
//! [`ValuePredicate`]. Plugins are tried in registration order; the first one
//! that does not answer [`PluginError::NotApplicable`] decides the outcome.

mod compare;
mod length;
mod pattern;
pub(crate) mod range;
mod regexp;

use std::sync::Arc;

use thiserror::Error;

use crate::error::Result;
use crate::types::ValuePredicate;

pub use compare::ComparePlugin;
pub use length::LengthPlugin;
pub use pattern::PatternPlugin;
pub use range::RangePlugin;
pub use regexp::RegexPlugin;

/// Default capacity of the compiled-matcher caches held by plugins
pub const DEFAULT_PLUGIN_CACHE_SIZE: usize = 256;

/// Outcome of a plugin parse that did not produce a predicate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// The text is outside this plugin's syntax; try the next plugin.
    #[error("constraint not applicable")]
    NotApplicable,

    /// The text is in this plugin's syntax but malformed; abort the whole parse.
    #[error("{0}")]
    Malformed(String),
}

/// Capability contract for custom constraint syntaxes
pub trait ConstraintPlugin: Send + Sync {
    /// Stable plugin name, used in errors and rule introspection.
    fn name(&self) -> &str;

    /// Cheap check whether `constraint` looks like this plugin's syntax.
    /// Without an override, the constraint is parsed and any outcome other
    /// than `NotApplicable` counts.
    fn can_parse(&self, constraint: &str) -> bool {
        !matches!(self.parse("", constraint), Err(PluginError::NotApplicable))
    }

    /// Compile `constraint` for parameter `param`.
    fn parse(&self, param: &str, constraint: &str) -> std::result::Result<ValuePredicate, PluginError>;

    /// Release cached resources.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// The built-in plugins, in their default registration order.
pub fn default_plugins() -> Vec<Arc<dyn ConstraintPlugin>> {
    vec![
        Arc::new(RangePlugin),
        Arc::new(LengthPlugin),
        Arc::new(ComparePlugin),
        Arc::new(PatternPlugin::new(DEFAULT_PLUGIN_CACHE_SIZE)),
        Arc::new(RegexPlugin::new(DEFAULT_PLUGIN_CACHE_SIZE)),
    ]
}

/// Strip a `prefix:` namespace, returning the trimmed body.
pub(crate) fn strip_namespace<'a>(constraint: &'a str, prefix: &str) -> Option<&'a str> {
    constraint.strip_prefix(prefix).map(str::trim)
}
