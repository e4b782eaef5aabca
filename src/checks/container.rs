//! Slice, map, record and open-value checks.
//!
//! Containers never see a token of their own; the engine drives their children and calls
//! `post_check` with the final element or entry count.

use super::{expect_shape, invalid, parse_count, Interval};
use crate::ast::Rule;
use crate::compiler::CompileError;
use crate::error::{ErrorKind, Measure};
use crate::shape::Shape;
use crate::validator::{Check, Scalar};
use std::sync::Arc;

fn container_only(rule: &Rule) -> Result<(), CompileError> {
    if rule.values.is_some() || rule.pattern.is_some() {
        return Err(invalid(rule, "containers accept only parameters and a count range"));
    }
    Ok(())
}

#[derive(Debug)]
pub struct SliceCheck {
    element: Option<Rule>,
    count: Interval<usize>,
}

pub fn slice_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    expect_shape(rule, shape, matches!(shape, Shape::List(_)))?;
    container_only(rule)?;
    let element = match rule.params.len() {
        0 => None,
        1 => Some(
            rule.param_rule(0)
                .cloned()
                .ok_or_else(|| invalid(rule, "element parameter must be a rule"))?,
        ),
        _ => return Err(invalid(rule, "expected one element rule")),
    };
    Ok(Arc::new(SliceCheck {
        element,
        count: Interval::parse(rule, rule.range.as_ref(), parse_count)?,
    }))
}

impl Check for SliceCheck {
    fn check(&self, _token: &Scalar<'_>) -> Vec<ErrorKind> {
        Vec::new()
    }

    fn post_check(&self, len: usize) -> Vec<ErrorKind> {
        self.count.check(Measure::Count, len, len).into_iter().collect()
    }

    fn element_rule(&self) -> Option<&Rule> {
        self.element.as_ref()
    }
}

#[derive(Debug)]
pub struct MapCheck {
    key: Option<Rule>,
    value: Option<Rule>,
    count: Interval<usize>,
}

pub fn map_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    expect_shape(rule, shape, matches!(shape, Shape::Map(_, _)))?;
    container_only(rule)?;
    let (key, value) = match rule.params.len() {
        0 => (None, None),
        2 => match (rule.param_rule(0), rule.param_rule(1)) {
            (Some(k), Some(v)) => (Some(k.clone()), Some(v.clone())),
            _ => return Err(invalid(rule, "key and value parameters must be rules")),
        },
        _ => return Err(invalid(rule, "expected <@key,@value>")),
    };
    Ok(Arc::new(MapCheck {
        key,
        value,
        count: Interval::parse(rule, rule.range.as_ref(), parse_count)?,
    }))
}

impl Check for MapCheck {
    fn check(&self, _token: &Scalar<'_>) -> Vec<ErrorKind> {
        Vec::new()
    }

    fn post_check(&self, len: usize) -> Vec<ErrorKind> {
        self.count.check(Measure::Count, len, len).into_iter().collect()
    }

    fn key_rule(&self) -> Option<&Rule> {
        self.key.as_ref()
    }

    fn value_rule(&self) -> Option<&Rule> {
        self.value.as_ref()
    }
}

/// Record fields carry their own rules; the record rule only decides optionality.
#[derive(Debug)]
pub struct Passthrough;

impl Check for Passthrough {
    fn check(&self, _token: &Scalar<'_>) -> Vec<ErrorKind> {
        Vec::new()
    }
}

pub fn record_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    expect_shape(rule, shape, matches!(shape, Shape::Record(_)))?;
    container_only(rule)?;
    if !rule.params.is_empty() || rule.range.is_some() {
        return Err(invalid(rule, "@record takes no parameters or range"));
    }
    Ok(Arc::new(Passthrough))
}

pub fn any_check(rule: &Rule, _shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    if !rule.params.is_empty() || rule.range.is_some() || rule.values.is_some() || rule.pattern.is_some() {
        return Err(invalid(rule, "@any takes no constraints"));
    }
    Ok(Arc::new(Passthrough))
}
