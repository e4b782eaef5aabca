//! Builtin rule providers.

pub mod container;
pub mod format;
pub mod number;
pub mod string;

use crate::ast::{Range, Rule};
use crate::compiler::CompileError;
use crate::error::{ErrorKind, Measure};
use crate::registry::Provider;
use crate::shape::Shape;
use std::sync::Arc;

/// Every builtin provider with its names. Formats are listed in [`format::builtin_formats`].
pub fn builtin_providers() -> Vec<(Vec<&'static str>, Arc<Provider>)> {
    vec![
        (vec!["bool"], Arc::new(number::bool_check) as Arc<Provider>),
        (vec!["int"], Arc::new(number::int_check) as Arc<Provider>),
        (vec!["uint"], Arc::new(number::uint_check) as Arc<Provider>),
        (vec!["float"], Arc::new(number::float_check) as Arc<Provider>),
        (vec!["string"], Arc::new(string::string_check) as Arc<Provider>),
        (vec!["slice", "array", "list"], Arc::new(container::slice_check) as Arc<Provider>),
        (vec!["map"], Arc::new(container::map_check) as Arc<Provider>),
        (vec!["record", "struct", "object"], Arc::new(container::record_check) as Arc<Provider>),
        (vec!["any"], Arc::new(container::any_check) as Arc<Provider>),
    ]
}

pub(crate) fn invalid(rule: &Rule, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidRule {
        rule: rule.render(),
        reason: reason.into(),
    }
}

pub(crate) fn mismatch(rule: &Rule, shape: &Shape) -> CompileError {
    CompileError::ShapeMismatch {
        rule: rule.render(),
        shape: shape.to_string(),
    }
}

pub(crate) fn expect_shape(rule: &Rule, shape: &Shape, ok: bool) -> Result<(), CompileError> {
    if ok {
        Ok(())
    } else {
        Err(mismatch(rule, shape))
    }
}

/// One side of an [`Interval`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Limit<T> {
    pub value: T,
    pub text: String,
    pub exclusive: bool,
}

/// Parsed range with typed bounds; the original text is kept for error messages.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Interval<T> {
    pub low: Option<Limit<T>>,
    pub high: Option<Limit<T>>,
}

impl<T: PartialOrd + Copy> Interval<T> {
    pub fn unbounded() -> Self {
        Interval { low: None, high: None }
    }

    pub fn parse(rule: &Rule, range: Option<&Range>, conv: impl Fn(&str) -> Option<T>) -> Result<Self, CompileError> {
        let mut out = Interval::unbounded();
        let Some(range) = range else {
            return Ok(out);
        };
        let limit = |b: &crate::ast::Bound| -> Result<Limit<T>, CompileError> {
            let value = conv(&b.value).ok_or_else(|| invalid(rule, format!("bad bound {}", b.value)))?;
            Ok(Limit {
                value,
                text: b.value.clone(),
                exclusive: b.exclusive,
            })
        };
        if let Some(b) = &range.low {
            out.low = Some(limit(b)?);
        }
        if let Some(b) = &range.high {
            out.high = Some(limit(b)?);
        }
        Ok(out)
    }

    pub fn contains(&self, v: T) -> bool {
        let above = match &self.low {
            Some(l) if l.exclusive => v > l.value,
            Some(l) => v >= l.value,
            None => true,
        };
        let below = match &self.high {
            Some(h) if h.exclusive => v < h.value,
            Some(h) => v <= h.value,
            None => true,
        };
        above && below
    }

    pub fn violation(&self, measure: Measure, actual: impl ToString) -> ErrorKind {
        ErrorKind::OutOfRange {
            measure,
            actual: actual.to_string(),
            min: self.low.as_ref().map(|l| l.text.clone()),
            max: self.high.as_ref().map(|h| h.text.clone()),
            exclusive_min: self.low.as_ref().map_or(false, |l| l.exclusive),
            exclusive_max: self.high.as_ref().map_or(false, |h| h.exclusive),
        }
    }

    /// `Some(error)` when `v` falls outside.
    pub fn check(&self, measure: Measure, v: T, actual: impl ToString) -> Option<ErrorKind> {
        (!self.contains(v)).then(|| self.violation(measure, actual))
    }
}

/// Length and count ranges must be non-negative integers.
pub(crate) fn parse_count(s: &str) -> Option<usize> {
    s.parse().ok()
}
