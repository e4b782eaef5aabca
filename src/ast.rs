//! Abstract Syntax Tree for the rule language.
//!
//! A [`Rule`] is produced by [`crate::parser::parse`] and is immutable afterwards. Its
//! [`Display`](std::fmt::Display) impl is the canonical rendering: no whitespace, literals
//! bare where that is unambiguous, quoted otherwise.

use std::fmt;

/// One parsed rule, e.g. `@map<@string[2,],@int[0,]>[1,5]?`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Rule name without the leading `@`.
    pub name: String,
    pub params: Vec<Param>,
    pub range: Option<Range>,
    pub values: Option<Values>,
    /// Regex source with `\/` already unescaped.
    pub pattern: Option<String>,
    pub optional: bool,
    pub default: Option<String>,
}

/// Type parameter: a literal (`8`, `rune`) or a nested rule (`@int[0,]`).
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Literal(String),
    Rule(Rule),
}

/// Numeric or length range. A missing bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Range {
    pub low: Option<Bound>,
    pub high: Option<Bound>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    /// Number text as written (`-1.5`, `10`).
    pub value: String,
    pub exclusive: bool,
}

/// `{a,b,c}` or `{%n}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    OneOf(Vec<String>),
    MultipleOf(String),
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Rule {
            name: name.into(),
            params: Vec::new(),
            range: None,
            values: None,
            pattern: None,
            optional: false,
            default: None,
        }
    }

    /// Canonical text; `parse(rule.render())` yields an equal rule.
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn param_literal(&self, i: usize) -> Option<&str> {
        match self.params.get(i) {
            Some(Param::Literal(s)) => Some(s),
            _ => None,
        }
    }

    pub fn param_rule(&self, i: usize) -> Option<&Rule> {
        match self.params.get(i) {
            Some(Param::Rule(r)) => Some(r),
            _ => None,
        }
    }

    pub fn one_of(&self) -> Option<&[String]> {
        match &self.values {
            Some(Values::OneOf(v)) => Some(v),
            _ => None,
        }
    }

    pub fn multiple_of(&self) -> Option<&str> {
        match &self.values {
            Some(Values::MultipleOf(v)) => Some(v),
            _ => None,
        }
    }
}

impl Range {
    pub fn exact(value: impl Into<String>) -> Self {
        let value = value.into();
        Range {
            low: Some(Bound { value: value.clone(), exclusive: false }),
            high: Some(Bound { value, exclusive: false }),
        }
    }
}

/// A literal can be written bare unless it would collide with rule punctuation.
fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.starts_with('@')
        || s.starts_with('%')
        || s.chars().any(|c| {
            c.is_whitespace()
                || matches!(c, ',' | '{' | '}' | '<' | '>' | '\'' | '/' | '?' | '=' | '[' | ']' | '(' | ')' | '\\')
        })
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            _ => write!(f, "{}", c)?,
        }
    }
    f.write_str("'")
}

fn write_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if needs_quotes(s) {
        write_quoted(f, s)
    } else {
        f.write_str(s)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.params.is_empty() {
            f.write_str("<")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                match p {
                    Param::Literal(s) => write_literal(f, s)?,
                    Param::Rule(r) => write!(f, "{}", r)?,
                }
            }
            f.write_str(">")?;
        }
        if let Some(range) = &self.range {
            write!(f, "{}", range)?;
        }
        match &self.values {
            Some(Values::OneOf(items)) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_literal(f, item)?;
                }
                f.write_str("}")?;
            }
            Some(Values::MultipleOf(n)) => write!(f, "{{%{}}}", n)?,
            None => {}
        }
        if let Some(pattern) = &self.pattern {
            f.write_str("/")?;
            let mut escaped = false;
            for c in pattern.chars() {
                if c == '/' && !escaped {
                    f.write_str("\\/")?;
                } else {
                    write!(f, "{}", c)?;
                }
                escaped = c == '\\' && !escaped;
            }
            f.write_str("/")?;
        }
        if self.optional {
            f.write_str("?")?;
        }
        if let Some(default) = &self.default {
            f.write_str("=")?;
            write_quoted(f, default)?;
        }
        Ok(())
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.low.as_ref().map_or(false, |b| b.exclusive) { '(' } else { '[' };
        let close = if self.high.as_ref().map_or(false, |b| b.exclusive) { ')' } else { ']' };
        write!(f, "{}", open)?;
        if let Some(low) = &self.low {
            f.write_str(&low.value)?;
        }
        f.write_str(",")?;
        if let Some(high) = &self.high {
            f.write_str(&high.value)?;
        }
        write!(f, "{}", close)
    }
}
