use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{GuardError, ParseErrorKind, Result};
use crate::plugin::range::{looks_like_bounds, parse_bounds};
use crate::plugin::{ConstraintPlugin, PluginError};
use crate::scan::{
    find_top_level, matching_close, split_top_level, split_unescaped, unescape_question, Unbalanced,
};
use crate::types::{Constraint, ParamRule, RawRules, ALLOW_ALL};

/// Constraint body that defers to the engine callback
const CALLBACK_CONSTRAINT: &str = "callback";

/// Parse rule DSL text.
///
/// Groups are separated by `;` or newlines at bracket depth zero; lines
/// starting with `#` are comments. Each group is either
/// `<pattern>?<params>` (URL-scoped) or `<params>` (global).
/// Constraint text the DSL does not understand natively is offered to
/// `plugins` in order.
pub fn parse_rules(text: &str, plugins: &[Arc<dyn ConstraintPlugin>]) -> Result<RawRules> {
    let text = strip_comments(text);
    let groups = split_top_level(&text, b";\n").map_err(|u| unbalanced(0, u))?;

    let mut rules = RawRules::new();
    for (i, group) in groups.iter().enumerate() {
        let group_num = i + 1;
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        parse_group(group, group_num, plugins, &mut rules)?;
    }
    Ok(rules)
}

/// Parse rule DSL text from a file.
pub fn parse_rules_from_file(
    path: impl AsRef<Path>,
    plugins: &[Arc<dyn ConstraintPlugin>],
) -> Result<RawRules> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_rules(&text, plugins)
}

fn strip_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn unbalanced(group: usize, u: Unbalanced) -> GuardError {
    GuardError::parse(
        ParseErrorKind::UnbalancedBrackets,
        group,
        format!("unbalanced brackets at offset {}", u.offset),
    )
}

/// Split a group into `(pattern, params)` when it is URL-scoped.
fn split_url_group(group: &str, group_num: usize) -> Result<Option<(&str, &str)>> {
    let Some(q) = find_top_level(group, b'?').map_err(|u| unbalanced(group_num, u))? else {
        return Ok(None);
    };
    let (head, params) = (&group[..q], &group[q + 1..]);

    let rooted = group.starts_with('/') || group.starts_with('*');
    let bare_path = match head.find('/') {
        Some(slash) => !head[..slash].contains('=') && group.contains('['),
        None => false,
    };
    if rooted || bare_path {
        return Ok(Some((head, params)));
    }
    if head.trim().is_empty() {
        return Err(GuardError::parse(
            ParseErrorKind::EmptyPattern,
            group_num,
            "URL group has no pattern before '?'",
        ));
    }
    Ok(None)
}

fn parse_group(
    group: &str,
    group_num: usize,
    plugins: &[Arc<dyn ConstraintPlugin>],
    rules: &mut RawRules,
) -> Result<()> {
    match split_url_group(group, group_num)? {
        Some((pattern, params)) => {
            let pattern = normalize_pattern(pattern);
            let params = parse_param_list(params, group_num, plugins)?;
            rules.insert_url_rule(pattern, params);
        }
        None => {
            for rule in parse_param_list(group, group_num, plugins)? {
                rules.insert_global(rule);
            }
        }
    }
    Ok(())
}

/// Parse an `&`-separated parameter list.
pub fn parse_param_list(
    params: &str,
    group_num: usize,
    plugins: &[Arc<dyn ConstraintPlugin>],
) -> Result<Vec<ParamRule>> {
    let specs = split_top_level(params, b"&").map_err(|u| unbalanced(group_num, u))?;
    let mut rules = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        rules.push(parse_param_spec(spec, group_num, plugins)?);
    }
    if rules.len() > 1 && rules.iter().any(ParamRule::is_allow_all) {
        return Err(GuardError::parse(
            ParseErrorKind::InvalidConstraint,
            group_num,
            format!("'{}' must be the only parameter in its list: {}", ALLOW_ALL, params),
        ));
    }
    Ok(rules)
}

/// Parse one parameter spec: `name`, `name=[...]` or `name!=[...]`.
pub fn parse_param_spec(
    spec: &str,
    group_num: usize,
    plugins: &[Arc<dyn ConstraintPlugin>],
) -> Result<ParamRule> {
    let Some(eq) = find_top_level(spec, b'=').map_err(|u| unbalanced(group_num, u))? else {
        if spec.contains('[') || spec.contains(']') {
            return Err(GuardError::parse(
                ParseErrorKind::InvalidConstraint,
                group_num,
                format!("constraint without '=': {}", spec),
            ));
        }
        return Ok(ParamRule::any(spec));
    };

    let (raw_name, rest) = (spec[..eq].trim(), spec[eq + 1..].trim());
    let (name, inverted) = match raw_name.strip_suffix('!') {
        Some(name) => (name.trim(), true),
        None => (raw_name, false),
    };
    if name.is_empty() {
        return Err(GuardError::parse(
            ParseErrorKind::EmptyName,
            group_num,
            format!("empty parameter name in '{}'", spec),
        ));
    }
    if !rest.starts_with('[') {
        return Err(GuardError::parse(
            ParseErrorKind::InvalidConstraint,
            group_num,
            format!("expected '[' after '=' in '{}'", spec),
        ));
    }
    let close = matching_close(rest).map_err(|u| unbalanced(group_num, u))?;
    if close + 1 != rest.len() {
        return Err(GuardError::parse(
            ParseErrorKind::TrailingInput,
            group_num,
            format!("unexpected text after constraint: '{}'", &rest[close + 1..]),
        ));
    }

    let body = rest[1..close].trim();
    let constraint = parse_constraint(name, body, group_num, plugins)?;
    let mut rule = ParamRule::new(name, constraint);
    rule.inverted = inverted;
    Ok(rule)
}

fn parse_constraint(
    name: &str,
    body: &str,
    group_num: usize,
    plugins: &[Arc<dyn ConstraintPlugin>],
) -> Result<Constraint> {
    if body.is_empty() {
        return Ok(Constraint::KeyOnly);
    }
    if body == ALLOW_ALL {
        return Ok(Constraint::Any);
    }
    if body == CALLBACK_CONSTRAINT {
        return Ok(Constraint::Callback);
    }
    if looks_like_bounds(body) {
        let (min, max) = parse_bounds(body).ok_or_else(|| {
            GuardError::parse(
                ParseErrorKind::InvalidRange,
                group_num,
                format!("range bounds out of range: {}", body),
            )
        })?;
        if min > max {
            return Err(GuardError::parse(
                ParseErrorKind::InvalidRange,
                group_num,
                format!("invalid range for '{}': {} > {}", name, min, max),
            ));
        }
        return Ok(Constraint::Range { min, max });
    }

    for plugin in plugins {
        match plugin.parse(name, body) {
            Ok(predicate) => {
                return Ok(Constraint::Plugin {
                    plugin: plugin.name().to_string(),
                    source: body.to_string(),
                    predicate,
                })
            }
            Err(PluginError::NotApplicable) => continue,
            Err(PluginError::Malformed(message)) => {
                return Err(GuardError::Plugin {
                    plugin: plugin.name().to_string(),
                    message: format!("{} (parameter '{}')", message, name),
                })
            }
        }
    }

    let values: Vec<String> = split_unescaped(body, b',')
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(GuardError::parse(
            ParseErrorKind::InvalidConstraint,
            group_num,
            format!("empty value list for '{}'", name),
        ));
    }
    Ok(Constraint::Enum(values))
}

/// Normalize a URL pattern.
///
/// Trims whitespace and prefixes a missing `/`. Wildcard patterns are
/// otherwise left as written; literal patterns are lexically cleaned.
pub fn normalize_pattern(pattern: &str) -> String {
    let pattern = unescape_question(pattern.trim());
    if pattern.contains('*') {
        if pattern.starts_with('/') || pattern.starts_with('*') {
            return pattern;
        }
        return format!("/{}", pattern);
    }
    clean_path(&pattern)
}

/// Lexically clean a path: collapse repeated slashes, drop `.` segments,
/// resolve `..` and strip a trailing slash. The result always starts with `/`.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    out.push_str(&segments.join("/"));
    out
}
