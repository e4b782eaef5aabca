//! Compiled validators.
//!
//! A [`Check`] is the rule-specific constraint body; a [`Validator`] wraps one with the
//! required/optional decision, the default literal, and the compiled child validators of a
//! container. Validators hold no per-decode state and are shared through `Arc`.

use crate::ast::Rule;
use crate::error::ErrorKind;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Borrowed view of one scalar token handed to a check.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<'a> {
    Null,
    Bool(bool),
    /// Number text as it appeared on the wire.
    Number(Cow<'a, str>),
    String(Cow<'a, str>),
}

impl Scalar<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Number(_) => "number",
            Scalar::String(_) => "string",
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Scalar::Number(s) | Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Constraint body produced by a registered provider.
///
/// `check` sees one scalar token; containers return nothing there and validate their
/// element count in `post_check` once the engine has consumed them.
pub trait Check: Send + Sync + fmt::Debug {
    fn check(&self, token: &Scalar<'_>) -> Vec<ErrorKind>;

    fn post_check(&self, _len: usize) -> Vec<ErrorKind> {
        Vec::new()
    }

    /// Rule for list elements, when the rule names one.
    fn element_rule(&self) -> Option<&Rule> {
        None
    }

    fn key_rule(&self) -> Option<&Rule> {
        None
    }

    fn value_rule(&self) -> Option<&Rule> {
        None
    }
}

/// A check wrapped with optionality, default, and child validators.
#[derive(Debug)]
pub struct Validator {
    rule: Rule,
    check: Arc<dyn Check>,
    element: Option<Arc<Validator>>,
    key: Option<Arc<Validator>>,
    value: Option<Arc<Validator>>,
}

impl Validator {
    pub(crate) fn new(rule: Rule, check: Arc<dyn Check>) -> Self {
        Validator {
            rule,
            check,
            element: None,
            key: None,
            value: None,
        }
    }

    pub(crate) fn with_element(mut self, element: Arc<Validator>) -> Self {
        self.element = Some(element);
        self
    }

    pub(crate) fn with_entries(mut self, key: Arc<Validator>, value: Arc<Validator>) -> Self {
        self.key = Some(key);
        self.value = Some(value);
        self
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn is_optional(&self) -> bool {
        self.rule.optional
    }

    pub fn default_literal(&self) -> Option<&str> {
        self.rule.default.as_deref()
    }

    pub fn element(&self) -> Option<&Arc<Validator>> {
        self.element.as_ref()
    }

    pub fn key(&self) -> Option<&Arc<Validator>> {
        self.key.as_ref()
    }

    pub fn value(&self) -> Option<&Arc<Validator>> {
        self.value.as_ref()
    }

    pub fn check(&self, token: &Scalar<'_>) -> Vec<ErrorKind> {
        self.check.check(token)
    }

    pub fn post_check(&self, len: usize) -> Vec<ErrorKind> {
        self.check.post_check(len)
    }

    /// Outcome for an absent or null value with no default: nothing when optional,
    /// `MissingRequired` otherwise.
    pub fn check_absent(&self) -> Option<ErrorKind> {
        if self.is_optional() {
            None
        } else {
            Some(ErrorKind::MissingRequired)
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule)
    }
}
