use thiserror::Error;

/// Classifies rule parse errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// `[` and `]` do not pair up
    UnbalancedBrackets,
    /// A parameter spec has no name
    EmptyName,
    /// Range bounds are not integers or `min > max`
    InvalidRange,
    /// Constraint body is not understood (e.g. `name=value` without brackets)
    InvalidConstraint,
    /// A URL group has nothing before its `?`
    EmptyPattern,
    /// Text follows the closing bracket of a constraint
    TrailingInput,
}

/// Param guard error types
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Parse error in group {group}: {message}")]
    Parse {
        kind: ParseErrorKind,
        group: usize,
        message: String,
    },

    #[error("Plugin '{plugin}' rejected constraint: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Rule text too large: {size} bytes exceeds limit of {limit}")]
    RulesTooLarge { size: usize, limit: usize },

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Engine is closed")]
    Closed,

    #[error("Plugin '{plugin}' failed to close: {message}")]
    PluginClose { plugin: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GuardError {
    pub(crate) fn parse(kind: ParseErrorKind, group: usize, message: impl Into<String>) -> Self {
        GuardError::Parse {
            kind,
            group,
            message: message.into(),
        }
    }

    /// The parse error kind, if this is a DSL parse error.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            GuardError::Parse { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
