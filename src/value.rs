//! Destination value tree filled by the decoder.

use crate::shape::{RecordType, Shape};

/// A decoded value. Record members are stored positionally, in declaration order of the
/// record's [`RecordType::fields`]; an unallocated pointer slot is `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Entries in wire order.
    Map(Vec<(Value, Value)>),
    Record(Vec<Value>),
    Any(serde_json::Value),
}

impl Value {
    /// The zero value a fresh destination of `shape` holds.
    pub fn zero(shape: &Shape) -> Value {
        match shape {
            Shape::Bool => Value::Bool(false),
            Shape::Int { .. } => Value::Int(0),
            Shape::Uint { .. } => Value::Uint(0),
            Shape::Float { .. } => Value::Float(0.0),
            Shape::String => Value::String(String::new()),
            Shape::Bytes => Value::Bytes(Vec::new()),
            Shape::Any => Value::Any(serde_json::Value::Null),
            Shape::Pointer(_) => Value::Null,
            Shape::List(_) => Value::List(Vec::new()),
            Shape::Map(_, _) => Value::Map(Vec::new()),
            Shape::Record(rt) => Value::Record(rt.fields.iter().map(|f| Value::zero(&f.shape)).collect()),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(v) => v.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Record(fields) => fields.iter().all(Value::is_zero),
            Value::Any(v) => v.is_null(),
        }
    }

    /// Empty in the omit-empty sense: null, zero-length string/bytes/list/map.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(v) => v.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Any(v) => v.is_null(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Uint(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&[Value]> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_any(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Any(v) => Some(v),
            _ => None,
        }
    }

    /// Map entry by string key.
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Follow an index chain (see `FieldDescriptor::index`) through nested records.
    /// Returns `None` when an embedded pointer on the way is unallocated.
    pub fn slot(&self, index: &[usize]) -> Option<&Value> {
        let mut cur = self;
        for &i in index {
            cur = cur.as_record()?.get(i)?;
        }
        Some(cur)
    }

    /// Mutable [`Value::slot`], allocating embedded pointer records on the way.
    pub fn slot_mut(&mut self, rt: &RecordType, index: &[usize]) -> Option<&mut Value> {
        let (&first, rest) = index.split_first()?;
        let field = rt.fields.get(first)?;
        let slot = match self {
            Value::Record(fields) => fields.get_mut(first)?,
            _ => return None,
        };
        if rest.is_empty() {
            return Some(slot);
        }
        let inner = field.shape.embedded_record()?;
        if slot.is_null() {
            *slot = Value::zero(&Shape::Record(inner.clone()));
        }
        slot.slot_mut(inner, rest)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
