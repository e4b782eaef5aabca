//! Destination shapes and record declarations.
//!
//! [`Shape`] is the closed set of value categories the engine dispatches on. Record types are
//! declared once with [`RecordType`] / [`FieldDef`]; the per-field builder methods carry the
//! metadata that wire bindings attach to a member (wire name, location, casing, inlining,
//! catch-all, omit flags, stringified numbers, format hint, rule text).

use std::fmt;
use std::sync::Arc;

/// Structural category of a destination value.
#[derive(Debug, Clone)]
pub enum Shape {
    Bool,
    Int { bits: u8 },
    Uint { bits: u8 },
    Float { bits: u8 },
    String,
    /// Travels as a base64 string.
    Bytes,
    /// Open JSON value, no validation beyond well-formedness.
    Any,
    /// Nullable slot; `Value::Null` when absent.
    Pointer(Box<Shape>),
    List(Box<Shape>),
    Map(Box<Shape>, Box<Shape>),
    Record(Arc<RecordType>),
}

impl Shape {
    pub fn i64() -> Self {
        Shape::Int { bits: 64 }
    }

    pub fn u64() -> Self {
        Shape::Uint { bits: 64 }
    }

    pub fn f64() -> Self {
        Shape::Float { bits: 64 }
    }

    pub fn pointer(inner: Shape) -> Self {
        Shape::Pointer(Box::new(inner))
    }

    pub fn list(elem: Shape) -> Self {
        Shape::List(Box::new(elem))
    }

    pub fn map(key: Shape, value: Shape) -> Self {
        Shape::Map(Box::new(key), Box::new(value))
    }

    pub fn record(rt: RecordType) -> Self {
        Shape::Record(Arc::new(rt))
    }

    /// Strip every pointer layer.
    pub fn pointee(&self) -> &Shape {
        match self {
            Shape::Pointer(inner) => inner.pointee(),
            other => other,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Shape::Bool | Shape::Int { .. } | Shape::Uint { .. } | Shape::Float { .. } | Shape::String | Shape::Bytes
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Shape::Int { .. } | Shape::Uint { .. } | Shape::Float { .. })
    }

    /// Record reachable through at most pointer layers; used for inlining.
    pub fn embedded_record(&self) -> Option<&Arc<RecordType>> {
        match self.pointee() {
            Shape::Record(rt) => Some(rt),
            _ => None,
        }
    }

    /// Rule text used when a field carries none.
    pub fn default_rule(&self) -> String {
        match self {
            Shape::Bool => "@bool".to_string(),
            Shape::Int { bits } => format!("@int<{}>", bits),
            Shape::Uint { bits } => format!("@uint<{}>", bits),
            Shape::Float { .. } => "@float".to_string(),
            Shape::String | Shape::Bytes => "@string".to_string(),
            Shape::Any => "@any?".to_string(),
            Shape::List(_) => "@slice?".to_string(),
            Shape::Map(_, _) => "@map?".to_string(),
            Shape::Record(_) => "@record".to_string(),
            Shape::Pointer(inner) => {
                let mut rule = inner.default_rule();
                if !rule.ends_with('?') {
                    rule.push('?');
                }
                rule
            }
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Bool => f.write_str("bool"),
            Shape::Int { bits } => write!(f, "int{}", bits),
            Shape::Uint { bits } => write!(f, "uint{}", bits),
            Shape::Float { bits } => write!(f, "float{}", bits),
            Shape::String => f.write_str("string"),
            Shape::Bytes => f.write_str("bytes"),
            Shape::Any => f.write_str("any"),
            Shape::Pointer(inner) => write!(f, "*{}", inner),
            Shape::List(elem) => write!(f, "[]{}", elem),
            Shape::Map(k, v) => write!(f, "map[{}]{}", k, v),
            Shape::Record(rt) => write!(f, "record {}", rt.name),
        }
    }
}

/// Record identity is its name.
impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Shape::Bool, Shape::Bool)
            | (Shape::String, Shape::String)
            | (Shape::Bytes, Shape::Bytes)
            | (Shape::Any, Shape::Any) => true,
            (Shape::Int { bits: a }, Shape::Int { bits: b })
            | (Shape::Uint { bits: a }, Shape::Uint { bits: b })
            | (Shape::Float { bits: a }, Shape::Float { bits: b }) => a == b,
            (Shape::Pointer(a), Shape::Pointer(b)) | (Shape::List(a), Shape::List(b)) => a == b,
            (Shape::Map(ak, av), Shape::Map(bk, bv)) => ak == bk && av == bv,
            (Shape::Record(a), Shape::Record(b)) => a.name == b.name,
            _ => false,
        }
    }
}

/// How a field's wire name is matched against incoming member names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Casing {
    /// Follows `DecodeOptions::case_insensitive`.
    #[default]
    Default,
    Exact,
    IgnoreCase,
}

pub const DEFAULT_LOCATION: &str = "body";

/// A composite type: an ordered list of declared members.
#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        RecordType {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn into_shape(self) -> Shape {
        Shape::record(self)
    }
}

/// Declared metadata for one member of a [`RecordType`].
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Source identifier; also the wire name when none is given.
    pub ident: String,
    pub shape: Shape,
    pub wire_name: Option<String>,
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
}

impl FieldDef {
    pub fn new(ident: impl Into<String>, shape: Shape) -> Self {
        FieldDef {
            ident: ident.into(),
            shape,
            wire_name: None,
            location: DEFAULT_LOCATION.to_string(),
            casing: Casing::Default,
            inline: false,
            unknown: false,
            omit_zero: false,
            omit_empty: false,
            stringified: false,
            format: None,
            rule: String::new(),
            default: None,
        }
    }

    pub fn name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn casing(mut self, casing: Casing) -> Self {
        self.casing = casing;
        self
    }

    /// Embed: with no wire name and a record shape, the member's fields are flattened in.
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Collects object members no other field claims.
    pub fn unknown(mut self) -> Self {
        self.unknown = true;
        self
    }

    pub fn omit_zero(mut self) -> Self {
        self.omit_zero = true;
        self
    }

    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    /// Number or bool carried inside a JSON string (`"42"`).
    pub fn stringified(mut self) -> Self {
        self.stringified = true;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Default applied when the field carries no explicit rule.
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}
