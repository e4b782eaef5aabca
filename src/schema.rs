//! Field schema model: flattens a [`RecordType`] into an ordered, indexed field list.
//!
//! Inlined sub-records are expanded breadth-first, so a shallower name always shadows a
//! deeper one; two fields claiming the same name at the same depth is an error. A record type
//! reached twice (diamond or cycle through inlining) is expanded only the first time. Each
//! descriptor carries its `index` chain, which addresses the storage slot inside a
//! `Value::Record` tree without holding references into any particular value.

use crate::shape::{Casing, RecordType, Shape};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("record {record}: fields {first} and {second} both use wire name {name:?}")]
    DuplicateName {
        record: String,
        name: String,
        first: String,
        second: String,
    },
    #[error("record {record}: catch-all fields {first} and {second} are at the same depth")]
    AmbiguousCatchAll {
        record: String,
        first: String,
        second: String,
    },
    #[error("record {record}: catch-all field {field} must be a map with string keys or an open value, found {shape}")]
    InvalidCatchAll {
        record: String,
        field: String,
        shape: String,
    },
    #[error("record {record}: field {field} has an empty wire name")]
    EmptyName { record: String, field: String },
}

/// Resolved, flattened metadata for one record member.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub ident: String,
    pub wire_name: String,
    /// `wire_name` as a JSON string literal, ready for encoding.
    pub quoted_wire_name: String,
    pub location: String,
    pub casing: Casing,
    pub inline: bool,
    pub unknown: bool,
    pub omit_zero: bool,
    pub omit_empty: bool,
    pub stringified: bool,
    pub format: Option<String>,
    pub rule: String,
    pub default: Option<String>,
    pub shape: Shape,
    /// Field indices from the root record down to this member's slot.
    pub index: Vec<usize>,
    /// Number of inlining levels crossed (0 = declared directly on the root).
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub catch_all: Option<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    by_folded_name: HashMap<String, usize>,
    by_location: HashMap<String, Vec<usize>>,
}

impl RecordSchema {
    /// Exact wire-name lookup; returns the field's position in [`RecordSchema::fields`].
    pub fn field(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Resolve an incoming member name honoring each field's casing mode.
    pub fn lookup(&self, name: &str, case_insensitive_default: bool) -> Option<usize> {
        if let Some(&i) = self.by_name.get(name) {
            return Some(i);
        }
        let i = *self.by_folded_name.get(&name.to_lowercase())?;
        let folds = match self.fields[i].casing {
            Casing::IgnoreCase => true,
            Casing::Exact => false,
            Casing::Default => case_insensitive_default,
        };
        folds.then_some(i)
    }

    /// Fields travelling in the given location (`body`, `query`, `header`, ...).
    pub fn fields_in(&self, location: &str) -> impl Iterator<Item = &FieldDescriptor> {
        self.by_location
            .get(location)
            .into_iter()
            .flatten()
            .map(move |&i| &self.fields[i])
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.by_location.keys().map(String::as_str)
    }
}

fn descriptor(rt: &RecordType, i: usize, index: Vec<usize>, depth: usize) -> Result<FieldDescriptor, SchemaError> {
    let f = &rt.fields[i];
    let wire_name = f.wire_name.clone().unwrap_or_else(|| f.ident.clone());
    if wire_name.is_empty() && !f.unknown {
        return Err(SchemaError::EmptyName {
            record: rt.name.clone(),
            field: f.ident.clone(),
        });
    }
    let quoted_wire_name = serde_json::Value::String(wire_name.clone()).to_string();
    Ok(FieldDescriptor {
        ident: f.ident.clone(),
        wire_name,
        quoted_wire_name,
        location: f.location.clone(),
        casing: f.casing,
        inline: f.inline,
        unknown: f.unknown,
        omit_zero: f.omit_zero,
        omit_empty: f.omit_empty,
        stringified: f.stringified,
        format: f.format.clone(),
        rule: f.rule.clone(),
        default: f.default.clone(),
        shape: f.shape.clone(),
        index,
        depth,
    })
}

fn valid_catch_all(shape: &Shape) -> bool {
    match shape.pointee() {
        Shape::Any => true,
        Shape::Map(k, _) => matches!(k.pointee(), Shape::String),
        _ => false,
    }
}

/// Flatten `rt` into its field list and indexes.
pub fn compute_fields(rt: &RecordType) -> Result<RecordSchema, SchemaError> {
    let mut queue: VecDeque<(&RecordType, Vec<usize>, usize)> = VecDeque::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(rt.name.as_str());
    queue.push_back((rt, Vec::new(), 0));

    let mut fields: Vec<FieldDescriptor> = Vec::new();
    let mut names: HashMap<String, usize> = HashMap::new();
    let mut catch_all: Option<FieldDescriptor> = None;

    while let Some((current, prefix, depth)) = queue.pop_front() {
        for (i, f) in current.fields.iter().enumerate() {
            let mut index = prefix.clone();
            index.push(i);

            if f.unknown {
                if !valid_catch_all(&f.shape) {
                    return Err(SchemaError::InvalidCatchAll {
                        record: rt.name.clone(),
                        field: f.ident.clone(),
                        shape: f.shape.to_string(),
                    });
                }
                let candidate = descriptor(current, i, index, depth)?;
                match &catch_all {
                    None => catch_all = Some(candidate),
                    Some(existing) if existing.depth == depth => {
                        return Err(SchemaError::AmbiguousCatchAll {
                            record: rt.name.clone(),
                            first: existing.ident.clone(),
                            second: candidate.ident.clone(),
                        });
                    }
                    Some(existing) => {
                        tracing::warn!(
                            record = %rt.name,
                            kept = %existing.ident,
                            shadowed = %candidate.ident,
                            "deeper catch-all field ignored"
                        );
                    }
                }
                continue;
            }

            if f.inline && f.wire_name.is_none() {
                if let Some(inner) = f.shape.embedded_record() {
                    if visited.insert(inner.name.as_str()) {
                        queue.push_back((inner.as_ref(), index, depth + 1));
                    }
                    continue;
                }
            }

            let d = descriptor(current, i, index, depth)?;
            match names.get(&d.wire_name) {
                Some(&existing) if fields[existing].depth < depth => continue,
                Some(&existing) => {
                    return Err(SchemaError::DuplicateName {
                        record: rt.name.clone(),
                        name: d.wire_name.clone(),
                        first: fields[existing].ident.clone(),
                        second: d.ident,
                    });
                }
                None => {
                    names.insert(d.wire_name.clone(), fields.len());
                    fields.push(d);
                }
            }
        }
    }

    fields.sort_by(|a, b| a.index.cmp(&b.index));

    let mut by_name = HashMap::with_capacity(fields.len());
    let mut by_folded_name = HashMap::new();
    let mut by_location: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, f) in fields.iter().enumerate() {
        by_name.insert(f.wire_name.clone(), i);
        by_folded_name.entry(f.wire_name.to_lowercase()).or_insert(i);
        by_location.entry(f.location.clone()).or_default().push(i);
    }

    Ok(RecordSchema {
        name: rt.name.clone(),
        fields,
        catch_all,
        by_name,
        by_folded_name,
        by_location,
    })
}

/// Memoized [`compute_fields`], keyed by record name. Safe to share across threads.
#[derive(Debug, Default)]
pub struct SchemaCache {
    inner: RwLock<HashMap<String, Arc<RecordSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&self, rt: &RecordType) -> Result<Arc<RecordSchema>, SchemaError> {
        if let Some(hit) = self.inner.read().ok().and_then(|m| m.get(&rt.name).cloned()) {
            return Ok(hit);
        }
        let schema = Arc::new(compute_fields(rt)?);
        tracing::debug!(record = %rt.name, fields = schema.fields.len(), "computed record schema");
        let mut map = match self.inner.write() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(map.entry(rt.name.clone()).or_insert(schema).clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
