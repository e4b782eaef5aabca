//! String check: enum, pattern or length range.

use super::{expect_shape, invalid, parse_count, Interval};
use crate::ast::Rule;
use crate::compiler::CompileError;
use crate::error::{ErrorKind, Measure};
use crate::shape::Shape;
use crate::validator::{Check, Scalar};
use regex::Regex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMode {
    Bytes,
    Runes,
}

impl LengthMode {
    pub fn measure(self, s: &str) -> usize {
        match self {
            LengthMode::Bytes => s.len(),
            LengthMode::Runes => s.chars().count(),
        }
    }
}

#[derive(Debug)]
enum Constraint {
    OneOf(Vec<String>),
    Pattern { re: Regex, source: String },
    Length(Interval<usize>),
    None,
}

#[derive(Debug)]
pub struct StringCheck {
    mode: LengthMode,
    constraint: Constraint,
}

/// A pattern with neither `^` nor `$` must cover the whole string.
pub fn compile_pattern(source: &str) -> Result<Regex, regex::Error> {
    if is_anchored(source) {
        Regex::new(source)
    } else {
        Regex::new(&format!("^(?:{})$", source))
    }
}

/// Whether the pattern opens with `^`/`\A` (after inline flags) or closes with an
/// unescaped `$`/`\z`. Anchors inside classes or groups do not count.
fn is_anchored(source: &str) -> bool {
    let body = match source.strip_prefix("(?") {
        Some(rest) => match rest.find(')') {
            Some(end) if rest[..end].chars().all(|c| c.is_ascii_alphabetic() || c == '-') => &rest[end + 1..],
            _ => source,
        },
        None => source,
    };
    if body.starts_with('^') || body.starts_with("\\A") {
        return true;
    }
    let escapes = |tail: &str| tail.chars().rev().take_while(|c| *c == '\\').count();
    matches!(body.strip_suffix('$'), Some(head) if escapes(head) % 2 == 0)
        || matches!(body.strip_suffix("\\z"), Some(head) if escapes(head) % 2 == 0)
}

pub fn string_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    expect_shape(rule, shape, matches!(shape, Shape::String | Shape::Bytes))?;
    let mode = match (rule.params.len(), rule.param_literal(0)) {
        (0, _) => LengthMode::Bytes,
        (1, Some("byte" | "bytes")) => LengthMode::Bytes,
        (1, Some("rune" | "runes" | "char" | "chars")) => LengthMode::Runes,
        _ => return Err(invalid(rule, "length mode must be <byte> or <rune>")),
    };
    if rule.multiple_of().is_some() {
        return Err(invalid(rule, "multiple-of applies to numbers only"));
    }
    let constraint = if let Some(items) = rule.one_of() {
        Constraint::OneOf(items.to_vec())
    } else if let Some(source) = &rule.pattern {
        let re = compile_pattern(source).map_err(|e| invalid(rule, e.to_string()))?;
        Constraint::Pattern {
            re,
            source: source.clone(),
        }
    } else if rule.range.is_some() {
        Constraint::Length(Interval::parse(rule, rule.range.as_ref(), parse_count)?)
    } else {
        Constraint::None
    };
    Ok(Arc::new(StringCheck { mode, constraint }))
}

impl Check for StringCheck {
    fn check(&self, token: &Scalar<'_>) -> Vec<ErrorKind> {
        let Scalar::String(s) = token else {
            return vec![ErrorKind::invalid_type("string", token.kind())];
        };
        match &self.constraint {
            Constraint::OneOf(items) if !items.iter().any(|i| i == s) => vec![ErrorKind::NotInEnum {
                values: items.clone(),
            }],
            Constraint::Pattern { re, source } if !re.is_match(s) => vec![ErrorKind::PatternNotMatch {
                pattern: source.clone(),
            }],
            Constraint::Length(interval) => {
                let len = self.mode.measure(s);
                interval.check(Measure::Length, len, len).into_iter().collect()
            }
            _ => Vec::new(),
        }
    }
}
