//! Registry of rule providers and named formats.
//!
//! A registry is an explicit value (usually wrapped in an `Arc` and shared by one
//! [`crate::compiler::Compiler`]). Every name is insert-once: registering a name that a
//! provider or format already owns fails with [`CompileError::AlreadyRegistered`].

use crate::ast::Rule;
use crate::checks;
use crate::compiler::CompileError;
use crate::shape::Shape;
use crate::validator::Check;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Turns a parsed rule (and the pointer-stripped destination shape) into a check.
pub type Provider = dyn Fn(&Rule, &Shape) -> Result<Arc<dyn Check>, CompileError> + Send + Sync;

type Predicate = dyn Fn(&str) -> Result<(), String> + Send + Sync;

/// A named string predicate, usable as a rule (`@email`) or as a field format hint.
#[derive(Clone)]
pub struct Format {
    name: String,
    predicate: Arc<Predicate>,
}

impl Format {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        Format {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Regex-backed format; the whole string must match.
    pub fn regex(name: impl Into<String>, re: Regex) -> Self {
        let name = name.into();
        let reason = format!("not a valid {}", name);
        Format::new(name, move |s| if re.is_match(s) { Ok(()) } else { Err(reason.clone()) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, s: &str) -> Result<(), String> {
        (self.predicate)(s)
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Format").field("name", &self.name).finish_non_exhaustive()
    }
}

pub struct Registry {
    providers: RwLock<HashMap<String, Arc<Provider>>>,
    formats: RwLock<HashMap<String, Format>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let formats = self.formats.read().unwrap_or_else(PoisonError::into_inner);
        let mut p: Vec<_> = providers.keys().collect();
        let mut fm: Vec<_> = formats.keys().collect();
        p.sort();
        fm.sort();
        f.debug_struct("Registry").field("providers", &p).field("formats", &fm).finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim_start_matches('@').to_string()
}

/// Normalized names with repeats folded; fails on the first name already `taken`.
fn claim(names: &[&str], taken: impl Fn(&str) -> bool) -> Result<Vec<String>, CompileError> {
    let mut claimed: Vec<String> = Vec::with_capacity(names.len());
    for n in names {
        let n = normalize(n);
        if taken(&n) {
            return Err(CompileError::AlreadyRegistered(n));
        }
        if !claimed.contains(&n) {
            claimed.push(n);
        }
    }
    Ok(claimed)
}

impl Registry {
    /// A registry with no rules at all.
    pub fn empty() -> Self {
        Registry {
            providers: RwLock::new(HashMap::new()),
            formats: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding every builtin rule and format.
    pub fn new() -> Self {
        let mut providers = HashMap::new();
        for (names, provider) in checks::builtin_providers() {
            for name in names {
                providers.insert(normalize(name), provider.clone());
            }
        }
        let mut formats = HashMap::new();
        for (names, format) in checks::format::builtin_formats() {
            for name in names {
                formats.insert(normalize(name), format.clone());
            }
        }
        Registry {
            providers: RwLock::new(providers),
            formats: RwLock::new(formats),
        }
    }

    /// Register a provider under one or more names (`"@slice"`, `"array"`, ...). Either every
    /// name is registered or none is.
    pub fn register<F>(&self, names: &[&str], provider: F) -> Result<(), CompileError>
    where
        F: Fn(&Rule, &Shape) -> Result<Arc<dyn Check>, CompileError> + Send + Sync + 'static,
    {
        let provider: Arc<Provider> = Arc::new(provider);
        let mut map = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        let formats = self.formats.read().unwrap_or_else(PoisonError::into_inner);
        let names = claim(names, |n| map.contains_key(n) || formats.contains_key(n))?;
        for n in names {
            tracing::trace!(rule = %n, "registered rule provider");
            map.insert(n, provider.clone());
        }
        Ok(())
    }

    /// Register a format under one or more names; it becomes usable as `@name` too.
    pub fn register_format(&self, names: &[&str], format: Format) -> Result<(), CompileError> {
        // Lock order: providers, then formats.
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.formats.write().unwrap_or_else(PoisonError::into_inner);
        let names = claim(names, |n| providers.contains_key(n) || map.contains_key(n))?;
        for n in names {
            tracing::trace!(format = %n, "registered format");
            map.insert(n, format.clone());
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        let n = normalize(name);
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&n)
            || self.format(&n).is_some()
    }

    pub fn format(&self, name: &str) -> Option<Format> {
        self.formats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(name))
            .cloned()
    }

    /// Build the check for `rule` against a pointer-stripped shape.
    pub fn resolve(&self, rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
        let provider = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&rule.name)
            .cloned();
        if let Some(provider) = provider {
            return provider(rule, shape);
        }
        match self.format(&rule.name) {
            Some(format) => checks::format::format_check(format, rule, shape),
            None => Err(CompileError::UnknownRule(rule.name.clone())),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}
