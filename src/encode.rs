//! JSON encoder: the inverse of the decode engine's wire bindings.

use crate::codec::Codec;
use crate::decode::float_text;
use crate::error::{EncodeError, Pointer, Segment};
use crate::shape::Shape;
use crate::value::Value;
use base64::Engine as _;
use std::collections::HashSet;

pub(crate) struct Encoder<'c> {
    codec: &'c Codec,
    path: Pointer,
    out: String,
}

fn quote(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

fn key_text(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Uint(u) => Some(u.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Float(f) if f.is_finite() => Some(f.to_string()),
        _ => None,
    }
}

impl<'c> Encoder<'c> {
    pub(crate) fn new(codec: &'c Codec) -> Self {
        Encoder {
            codec,
            path: Pointer::root(),
            out: String::new(),
        }
    }

    pub(crate) fn into_string(self) -> String {
        self.out
    }

    fn mismatch(&self, shape: &Shape) -> EncodeError {
        EncodeError::Mismatch {
            pointer: self.path.clone(),
            expected: shape.to_string(),
        }
    }

    fn scalar_text(&mut self, text: &str, stringified: bool) {
        if stringified {
            self.out.push('"');
            self.out.push_str(text);
            self.out.push('"');
        } else {
            self.out.push_str(text);
        }
    }

    pub(crate) fn value(&mut self, value: &Value, shape: &Shape, stringified: bool) -> Result<(), EncodeError> {
        match (shape, value) {
            (Shape::Pointer(_) | Shape::Any, Value::Null) => self.out.push_str("null"),
            (Shape::Pointer(inner), v) => return self.value(v, inner, stringified),
            (Shape::Bool, Value::Bool(b)) => self.scalar_text(if *b { "true" } else { "false" }, stringified),
            (Shape::Int { .. }, Value::Int(i)) => self.scalar_text(&i.to_string(), stringified),
            (Shape::Uint { .. }, Value::Uint(u)) => self.scalar_text(&u.to_string(), stringified),
            (Shape::Float { .. }, Value::Float(f)) => {
                if !f.is_finite() {
                    return Err(EncodeError::NonFinite {
                        pointer: self.path.clone(),
                    });
                }
                self.scalar_text(&float_text(*f, shape), stringified);
            }
            (Shape::String, Value::String(s)) => self.out.push_str(&quote(s)),
            (Shape::Bytes, Value::Bytes(b)) => {
                let text = base64::engine::general_purpose::STANDARD.encode(b);
                self.out.push_str(&quote(&text));
            }
            (Shape::Any, Value::Any(j)) => self.out.push_str(&j.to_string()),
            (Shape::List(elem), Value::List(items)) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.path.push(Segment::Index(i));
                    self.value(item, elem, false)?;
                    self.path.pop();
                }
                self.out.push(']');
            }
            (Shape::Map(_, vs), Value::Map(entries)) => {
                self.out.push('{');
                for (i, (k, v)) in entries.iter().enumerate() {
                    let key = key_text(k).ok_or_else(|| self.mismatch(shape))?;
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.out.push_str(&quote(&key));
                    self.out.push(':');
                    self.path.push(Segment::Key(key));
                    self.value(v, vs, false)?;
                    self.path.pop();
                }
                self.out.push('}');
            }
            (Shape::Record(rt), Value::Record(_)) => {
                let schema = self.codec.schema(rt)?;
                let known: HashSet<&str> = schema.fields.iter().map(|f| f.wire_name.as_str()).collect();
                let mut count = 0;
                self.out.push('{');
                for fd in &schema.fields {
                    let Some(slot) = value.slot(&fd.index) else {
                        continue;
                    };
                    if (fd.omit_zero && slot.is_zero()) || (fd.omit_empty && slot.is_empty()) {
                        continue;
                    }
                    self.member(&fd.quoted_wire_name, &mut count);
                    self.path.push(Segment::Key(fd.wire_name.clone()));
                    self.value(slot, &fd.shape, fd.stringified)?;
                    self.path.pop();
                }
                if let Some(fd) = &schema.catch_all {
                    if let Some(slot) = value.slot(&fd.index) {
                        self.catch_all(slot, &fd.shape, &known, &mut count)?;
                    }
                }
                self.out.push('}');
            }
            _ => return Err(self.mismatch(shape)),
        }
        Ok(())
    }

    fn member(&mut self, quoted_key: &str, count: &mut usize) {
        if *count > 0 {
            self.out.push(',');
        }
        *count += 1;
        self.out.push_str(quoted_key);
        self.out.push(':');
    }

    /// Inline catch-all members into the enclosing object, skipping declared field names.
    fn catch_all(&mut self, slot: &Value, shape: &Shape, known: &HashSet<&str>, count: &mut usize) -> Result<(), EncodeError> {
        let mut members: Vec<(String, String)> = Vec::new();
        match (shape.pointee(), slot) {
            (_, Value::Null) => return Ok(()),
            (Shape::Map(_, vs), Value::Map(entries)) => {
                for (k, v) in entries {
                    let key = key_text(k).ok_or_else(|| self.mismatch(shape))?;
                    let mut nested = Encoder::new(self.codec);
                    nested.path = self.path.clone().key(key.clone());
                    nested.value(v, vs, false)?;
                    members.push((key, nested.into_string()));
                }
            }
            (Shape::Any, Value::Any(serde_json::Value::Object(map))) => {
                for (k, v) in map {
                    members.push((k.clone(), v.to_string()));
                }
            }
            (Shape::Any, Value::Any(serde_json::Value::Null)) => return Ok(()),
            _ => return Err(self.mismatch(shape)),
        }
        for (key, text) in members {
            if known.contains(key.as_str()) {
                continue;
            }
            self.member(&quote(&key), count);
            self.out.push_str(&text);
        }
        Ok(())
    }
}
