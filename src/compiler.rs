//! Rule compiler with a (shape, rule text) keyed validator cache.

use crate::ast::Rule;
use crate::decode::{assign, token_scalar};
use crate::parser::{self, SyntaxError};
use crate::registry::Registry;
use crate::schema::SchemaError;
use crate::shape::Shape;
use crate::token::{Cursor, Token};
use crate::validator::{Check, Validator};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("rule {text:?}: {source}")]
    Syntax {
        text: String,
        #[source]
        source: SyntaxError,
    },
    #[error("unknown rule @{0}")]
    UnknownRule(String),
    #[error("invalid rule {rule}: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("rule {rule} does not apply to {shape}")]
    ShapeMismatch { rule: String, shape: String },
    #[error("@{0} is already registered")]
    AlreadyRegistered(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Field-level hints consulted only when the rule text is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileHints {
    /// Named format to use instead of the shape's default rule.
    pub format: Option<String>,
    /// Mark the inferred rule optional (omit-empty / omit-zero fields).
    pub optional: bool,
    pub default: Option<String>,
}

type CacheKey = (String, String);

#[derive(Debug)]
pub struct Compiler {
    registry: Arc<Registry>,
    cache: RwLock<HashMap<CacheKey, Arc<Validator>>>,
}

fn parse_text(text: &str) -> Result<Rule, CompileError> {
    parser::parse(text).map_err(|source| CompileError::Syntax {
        text: text.to_string(),
        source,
    })
}

/// Quote a default literal the way rule text expects it.
fn quote_default(d: &str) -> String {
    format!("'{}'", d.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Rule text used for a field: the explicit text, or one inferred from shape and hints.
pub fn effective_rule(shape: &Shape, text: &str, hints: &CompileHints) -> String {
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    let mut rule = match (&hints.format, shape.pointee()) {
        (Some(format), Shape::String) => {
            let mut r = format!("@{}", format);
            if matches!(shape, Shape::Pointer(_)) {
                r.push('?');
            }
            r
        }
        _ => shape.default_rule(),
    };
    if hints.optional && !rule.ends_with('?') {
        rule.push('?');
    }
    if let Some(d) = &hints.default {
        rule.push('=');
        rule.push_str(&quote_default(d));
    }
    rule
}

impl Compiler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Compiler {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Compile `text` for `shape`; an empty text infers the shape's default rule.
    pub fn compile(&self, shape: &Shape, text: &str) -> Result<Arc<Validator>, CompileError> {
        self.compile_with(shape, text, &CompileHints::default())
    }

    pub fn compile_with(&self, shape: &Shape, text: &str, hints: &CompileHints) -> Result<Arc<Validator>, CompileError> {
        let effective = effective_rule(shape, text, hints);
        let key = (shape.to_string(), effective);
        if let Some(hit) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(hit.clone());
        }
        tracing::debug!(shape = %key.0, rule = %key.1, "compiling validator");
        let validator = self.build(parse_text(&key.1)?, shape)?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(key).or_insert(validator).clone())
    }

    /// Number of cached (shape, rule) pairs.
    pub fn cached(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn child(&self, explicit: Option<&Rule>, shape: &Shape) -> Result<Arc<Validator>, CompileError> {
        let rule = match explicit {
            Some(r) => r.clone(),
            None => parse_text(&shape.default_rule())?,
        };
        self.build(rule, shape)
    }

    fn build(&self, rule: Rule, shape: &Shape) -> Result<Arc<Validator>, CompileError> {
        let target = shape.pointee();
        let check = self.registry.resolve(&rule, target)?;
        check_default(&rule, target, check.as_ref())?;
        let mut validator = Validator::new(rule, check.clone());
        match target {
            Shape::List(elem) => {
                validator = validator.with_element(self.child(check.element_rule(), elem)?);
            }
            Shape::Map(k, v) => {
                let key = self.child(check.key_rule(), k)?;
                let value = self.child(check.value_rule(), v)?;
                validator = validator.with_entries(key, value);
            }
            _ => {}
        }
        Ok(Arc::new(validator))
    }
}

/// A default literal must decode into `target` and pass the rule's own check.
/// Container defaults are checked for syntax and kind only.
fn check_default(rule: &Rule, target: &Shape, check: &dyn Check) -> Result<(), CompileError> {
    let Some(text) = rule.default.as_deref() else {
        return Ok(());
    };
    let bad = |reason: String| CompileError::InvalidRule {
        rule: rule.render(),
        reason: format!("default {:?}: {}", text, reason),
    };
    let first = match target {
        Shape::String | Shape::Bytes => Token::String(Cow::Borrowed(text)),
        _ => {
            let mut cur = Cursor::new(text);
            let first = cur.next_token().map_err(|e| bad(e.to_string()))?;
            if first.is_container_start() {
                cur.skip_from(&first).map_err(|e| bad(e.to_string()))?;
            }
            cur.finish().map_err(|e| bad(e.to_string()))?;
            first
        }
    };
    match target {
        _ if first == Token::Null => Ok(()),
        Shape::Any => Ok(()),
        Shape::List(_) if first == Token::ArrayStart => Ok(()),
        Shape::Record(_) | Shape::Map(_, _) if first == Token::ObjectStart => Ok(()),
        Shape::List(_) => Err(bad(format!("expected array, found {}", first.kind()))),
        Shape::Record(_) | Shape::Map(_, _) => Err(bad(format!("expected object, found {}", first.kind()))),
        _ if first.is_container_start() => Err(bad(format!("expected {}, found {}", target, first.kind()))),
        _ => {
            let scalar = token_scalar(first, target, false);
            if let Some(e) = check.check(&scalar).into_iter().next() {
                return Err(bad(e.to_string()));
            }
            assign(target, &scalar).map(drop).map_err(|e| bad(e.to_string()))
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new(Arc::new(Registry::new()))
    }
}
