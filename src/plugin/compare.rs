use std::sync::Arc;

use super::{ConstraintPlugin, PluginError};
use crate::types::ValuePredicate;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Op {
    /// Longest operators first so `>=` is not read as `>`.
    const TOKENS: [(&'static str, Op); 6] = [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("==", Op::Eq),
        ("!=", Op::Ne),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];

    fn split(constraint: &str) -> Option<(Op, &str)> {
        Self::TOKENS
            .iter()
            .find_map(|(token, op)| constraint.strip_prefix(token).map(|rest| (*op, rest.trim())))
    }

    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Op::Gt => lhs > rhs,
            Op::Ge => lhs >= rhs,
            Op::Lt => lhs < rhs,
            Op::Le => lhs <= rhs,
            Op::Eq => lhs == rhs,
            Op::Ne => lhs != rhs,
        }
    }
}

/// `>N`, `>=N`, `<N`, `<=N`, `==N`, `!=N` - numeric comparison against a constant
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparePlugin;

impl ConstraintPlugin for ComparePlugin {
    fn name(&self) -> &str {
        "compare"
    }

    fn can_parse(&self, constraint: &str) -> bool {
        Op::split(constraint).is_some()
    }

    fn parse(&self, _param: &str, constraint: &str) -> Result<ValuePredicate, PluginError> {
        let (op, operand) = Op::split(constraint).ok_or(PluginError::NotApplicable)?;
        let rhs = operand
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| PluginError::Malformed(format!("invalid comparison operand: {}", operand)))?;

        Ok(Arc::new(move |value: &str| {
            value
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .is_some_and(|lhs| op.apply(lhs, rhs))
        }))
    }
}
