//! Decode engine: one recursive walk per call, dispatched on destination shape.
//!
//! Validation errors are collected with the absolute pointer of the value they concern and
//! decoding carries on; structural problems (malformed JSON, a container where a scalar is
//! expected, excessive nesting) abort the walk immediately.

use crate::codec::{BoundRecord, Codec};
use crate::compiler::CompileError;
use crate::error::{DecodeError, ErrorKind, Pointer, Segment, ValidationError, ValidationErrors};
use crate::shape::{RecordType, Shape};
use crate::token::{Cursor, Token};
use crate::validator::{Scalar, Validator};
use crate::value::Value;
use base64::Engine as _;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct Decoder<'c> {
    codec: &'c Codec,
    path: Pointer,
    errors: ValidationErrors,
    depth: usize,
}

fn missing_child(v: &Validator, what: &str) -> DecodeError {
    DecodeError::from(CompileError::InvalidRule {
        rule: v.rule().render(),
        reason: format!("no {} validator", what),
    })
}

fn json_quote(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Expected-token label for fatal mismatches.
fn expected_label(shape: &Shape) -> &'static str {
    match shape.pointee() {
        Shape::Record(_) | Shape::Map(_, _) => "object",
        Shape::List(_) => "array",
        Shape::Bool => "boolean",
        Shape::Int { .. } | Shape::Uint { .. } | Shape::Float { .. } => "number",
        Shape::String | Shape::Bytes => "string",
        Shape::Any => "value",
        Shape::Pointer(_) => "value",
    }
}

/// Scalar view of a token, honoring the stringified flag for numbers and booleans.
pub(crate) fn token_scalar<'t>(tok: Token<'t>, shape: &Shape, stringified: bool) -> Scalar<'t> {
    match tok {
        Token::Bool(b) => Scalar::Bool(b),
        Token::Number(n) => Scalar::Number(Cow::Borrowed(n)),
        Token::String(s) if stringified && shape.is_numeric() => Scalar::Number(s),
        Token::String(s) if stringified && matches!(shape, Shape::Bool) => match s.as_ref() {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => Scalar::String(s),
        },
        Token::String(s) => Scalar::String(s),
        _ => Scalar::Null,
    }
}

/// Convert a checked scalar into the destination representation.
pub(crate) fn assign(shape: &Shape, scalar: &Scalar<'_>) -> Result<Value, ErrorKind> {
    let mismatch = || ErrorKind::invalid_type(shape.to_string(), scalar.kind());
    match (shape, scalar) {
        (Shape::Bool, Scalar::Bool(b)) => Ok(Value::Bool(*b)),
        (Shape::Int { .. }, Scalar::Number(n)) => n.parse::<i64>().map(Value::Int).map_err(|_| mismatch()),
        (Shape::Uint { .. }, Scalar::Number(n)) => n.parse::<u64>().map(Value::Uint).map_err(|_| mismatch()),
        (Shape::Float { bits: 32 }, Scalar::Number(n)) => n
            .parse::<f32>()
            .map(|f| Value::Float(f as f64))
            .map_err(|_| mismatch()),
        (Shape::Float { .. }, Scalar::Number(n)) => n.parse::<f64>().map(Value::Float).map_err(|_| mismatch()),
        (Shape::String, Scalar::String(s)) => Ok(Value::String(s.to_string())),
        (Shape::Bytes, Scalar::String(s)) => base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map(Value::Bytes)
            .map_err(|_| ErrorKind::invalid_type("base64 string", "string")),
        _ => Err(mismatch()),
    }
}

/// Shortest text of a stored float; 32-bit destinations print at their own precision.
pub(crate) fn float_text(f: f64, shape: &Shape) -> String {
    match shape {
        Shape::Float { bits: 32 } => (f as f32).to_string(),
        _ => f.to_string(),
    }
}

/// Text a decoded map key is deduplicated on.
fn key_identity(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bytes(b) => base64::engine::general_purpose::STANDARD.encode(b),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Uint(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        other => format!("{:?}", other),
    }
}

/// Wire form of a materialized scalar, as a check sees it.
fn value_scalar<'v>(value: &'v Value, shape: &Shape) -> Option<Scalar<'v>> {
    Some(match value {
        Value::Null => Scalar::Null,
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Int(i) => Scalar::Number(Cow::Owned(i.to_string())),
        Value::Uint(u) => Scalar::Number(Cow::Owned(u.to_string())),
        Value::Float(f) => Scalar::Number(Cow::Owned(float_text(*f, shape))),
        Value::String(s) => Scalar::String(Cow::Borrowed(s)),
        Value::Bytes(b) => Scalar::String(Cow::Owned(base64::engine::general_purpose::STANDARD.encode(b))),
        _ => return None,
    })
}

impl<'c> Decoder<'c> {
    pub(crate) fn new(codec: &'c Codec) -> Self {
        Decoder {
            codec,
            path: Pointer::root(),
            errors: ValidationErrors::new(),
            depth: 0,
        }
    }

    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        self.errors.into_result().map_err(DecodeError::Invalid)
    }

    fn report(&mut self, kind: ErrorKind) {
        self.errors.push(ValidationError::new(self.path.clone(), kind));
    }

    fn report_all(&mut self, kinds: Vec<ErrorKind>) {
        for kind in kinds {
            self.report(kind);
        }
    }

    fn unexpected(&self, shape: &Shape, found: &Token<'_>) -> DecodeError {
        DecodeError::UnexpectedToken {
            pointer: self.path.clone(),
            expected: expected_label(shape),
            found: found.kind(),
        }
    }

    fn enter(&mut self) -> Result<(), DecodeError> {
        self.depth += 1;
        if self.depth > self.codec.options().max_depth {
            return Err(DecodeError::DepthExceeded {
                pointer: self.path.clone(),
                limit: self.codec.options().max_depth,
            });
        }
        Ok(())
    }

    /// Decode the value starting at `first` into `dest`. Syntax and compile errors raised
    /// below this frame without a location are tagged with its pointer.
    pub(crate) fn value<'s>(
        &mut self,
        dest: &mut Value,
        shape: &Shape,
        v: &Validator,
        cur: &mut Cursor<'s>,
        first: Token<'s>,
        stringified: bool,
    ) -> Result<(), DecodeError> {
        self.value_at(dest, shape, v, cur, first, stringified)
            .map_err(|e| e.located(&self.path))
    }

    fn value_at<'s>(
        &mut self,
        dest: &mut Value,
        shape: &Shape,
        v: &Validator,
        cur: &mut Cursor<'s>,
        first: Token<'s>,
        stringified: bool,
    ) -> Result<(), DecodeError> {
        if let Shape::Pointer(inner) = shape {
            if first == Token::Null {
                return self.absent(dest, shape, v);
            }
            if dest.is_null() {
                *dest = Value::zero(inner);
            }
            return self.value(dest, inner, v, cur, first, stringified);
        }
        if first == Token::Null {
            return self.absent(dest, shape, v);
        }
        match shape {
            Shape::Any => {
                let raw = cur.capture_from(&first)?;
                let parsed = serde_json::from_str(raw).map_err(|e| DecodeError::syntax(cur.offset(), e.to_string()))?;
                *dest = Value::Any(parsed);
                Ok(())
            }
            Shape::Record(rt) => self.guarded(|d| d.record(dest, rt, cur, first)),
            Shape::List(elem) => self.guarded(|d| d.list(dest, elem, v, cur, first)),
            Shape::Map(k, val) => self.guarded(|d| d.map(dest, k, val, v, cur, first)),
            _ => self.scalar(dest, shape, v, cur, first, stringified),
        }
    }

    fn guarded(&mut self, f: impl FnOnce(&mut Self) -> Result<(), DecodeError>) -> Result<(), DecodeError> {
        self.enter()?;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn scalar<'s>(
        &mut self,
        dest: &mut Value,
        shape: &Shape,
        v: &Validator,
        cur: &mut Cursor<'s>,
        first: Token<'s>,
        stringified: bool,
    ) -> Result<(), DecodeError> {
        let tok = if first == Token::ArrayStart {
            // Legacy producers wrap single scalars in an array.
            let inner = cur.next_token()?;
            if inner == Token::ArrayEnd || inner.is_container_start() {
                return Err(self.unexpected(shape, &first));
            }
            let close = cur.next_token()?;
            if close != Token::ArrayEnd {
                return Err(DecodeError::UnexpectedToken {
                    pointer: self.path.clone(),
                    expected: "single-element array",
                    found: close.kind(),
                });
            }
            if inner == Token::Null {
                return self.absent(dest, shape, v);
            }
            inner
        } else if first.is_container_start() {
            return Err(self.unexpected(shape, &first));
        } else {
            first
        };
        let scalar = token_scalar(tok, shape, stringified);
        let errs = v.check(&scalar);
        if !errs.is_empty() {
            self.report_all(errs);
            return Ok(());
        }
        match assign(shape, &scalar) {
            Ok(value) => *dest = value,
            Err(kind) => self.report(kind),
        }
        Ok(())
    }

    /// Absent or null value: default, zero, or `MissingRequired`.
    fn absent(&mut self, dest: &mut Value, shape: &Shape, v: &Validator) -> Result<(), DecodeError> {
        if let Some(default) = v.default_literal() {
            return self.apply_default(dest, shape, v, default);
        }
        match shape {
            Shape::Pointer(_) => {
                *dest = Value::Null;
                if let Some(kind) = v.check_absent() {
                    self.report(kind);
                }
            }
            Shape::Record(rt) if !v.is_optional() => {
                *dest = Value::zero(shape);
                self.fields_absent(dest, rt)?;
            }
            _ => {
                *dest = Value::zero(shape);
                if let Some(kind) = v.check_absent() {
                    self.report(kind);
                }
            }
        }
        Ok(())
    }

    fn apply_default(&mut self, dest: &mut Value, shape: &Shape, v: &Validator, default: &str) -> Result<(), DecodeError> {
        if matches!(shape.pointee(), Shape::String | Shape::Bytes) {
            let mut none = Cursor::new("");
            return self.value(dest, shape, v, &mut none, Token::String(Cow::Borrowed(default)), false);
        }
        let mut sub = Cursor::new(default);
        let first = sub.next_token()?;
        if first == Token::Null {
            *dest = Value::zero(shape);
            return Ok(());
        }
        self.value(dest, shape, v, &mut sub, first, false)?;
        sub.finish()
    }

    /// Run every field of `rt` against a synthetic null.
    fn fields_absent(&mut self, dest: &mut Value, rt: &RecordType) -> Result<(), DecodeError> {
        let bound = self.codec.bound(rt)?;
        for (i, fd) in bound.schema.fields.iter().enumerate() {
            self.path.push(Segment::Key(fd.wire_name.clone()));
            if let Some(slot) = dest.slot_mut(rt, &fd.index) {
                self.absent(slot, &fd.shape, &bound.validators[i])?;
            }
            self.path.pop();
        }
        Ok(())
    }

    fn record<'s>(&mut self, dest: &mut Value, rt: &Arc<RecordType>, cur: &mut Cursor<'s>, first: Token<'s>) -> Result<(), DecodeError> {
        let shape = Shape::Record(rt.clone());
        if first != Token::ObjectStart {
            return Err(self.unexpected(&shape, &first));
        }
        let bound = self.codec.bound(rt)?;
        let schema = &bound.schema;
        let options = *self.codec.options();
        if !matches!(dest, Value::Record(_)) {
            *dest = Value::zero(&shape);
        }
        let mut seen = vec![false; schema.fields.len()];
        let mut extra: Vec<(String, &'s str)> = Vec::new();
        loop {
            let key = match cur.next_token()? {
                Token::ObjectEnd => break,
                Token::String(k) => k,
                other => return Err(self.unexpected(&shape, &other)),
            };
            let found = schema.lookup(&key, options.case_insensitive);
            let label = match found {
                Some(i) => schema.fields[i].wire_name.clone(),
                None => key.to_string(),
            };
            self.path.push(Segment::Key(label));
            let first = cur.next_token().map_err(|e| e.located(&self.path))?;
            match found {
                Some(i) if seen[i] && !options.allow_duplicate_keys => {
                    self.report(ErrorKind::DuplicateKey { key: key.into_owned() });
                    cur.skip_from(&first).map_err(|e| e.located(&self.path))?;
                }
                Some(i) => {
                    seen[i] = true;
                    let fd = &schema.fields[i];
                    match dest.slot_mut(rt, &fd.index) {
                        Some(slot) => self.value(slot, &fd.shape, &bound.validators[i], cur, first, fd.stringified)?,
                        None => cur.skip_from(&first).map_err(|e| e.located(&self.path))?,
                    }
                }
                None if schema.catch_all.is_some() => {
                    let raw = cur.capture_from(&first).map_err(|e| e.located(&self.path))?;
                    extra.push((key.into_owned(), raw));
                }
                None => {
                    if options.reject_unknown_fields {
                        self.report(ErrorKind::UnknownField { name: key.into_owned() });
                    }
                    cur.skip_from(&first).map_err(|e| e.located(&self.path))?;
                }
            }
            self.path.pop();
        }

        for (i, fd) in schema.fields.iter().enumerate() {
            if seen[i] {
                continue;
            }
            let v = &bound.validators[i];
            // Fields of an unallocated embedded pointer stay unallocated unless they need a value.
            if dest.slot(&fd.index).is_none() && v.is_optional() && v.default_literal().is_none() {
                continue;
            }
            self.path.push(Segment::Key(fd.wire_name.clone()));
            if let Some(slot) = dest.slot_mut(rt, &fd.index) {
                self.absent(slot, &fd.shape, v)?;
            }
            self.path.pop();
        }

        self.catch_all(dest, rt, &bound, extra)
    }

    fn catch_all(&mut self, dest: &mut Value, rt: &RecordType, bound: &BoundRecord, extra: Vec<(String, &str)>) -> Result<(), DecodeError> {
        let (Some(fd), Some(v)) = (&bound.schema.catch_all, &bound.catch_all) else {
            return Ok(());
        };
        if extra.is_empty() {
            return Ok(());
        }
        let mut text = String::from("{");
        for (i, (k, raw)) in extra.iter().enumerate() {
            if i > 0 {
                text.push(',');
            }
            text.push_str(&json_quote(k));
            text.push(':');
            text.push_str(raw);
        }
        text.push('}');
        let Some(slot) = dest.slot_mut(rt, &fd.index) else {
            return Ok(());
        };
        let mut sub = Cursor::new(&text);
        let first = sub.next_token()?;
        self.value(slot, &fd.shape, v, &mut sub, first, false)?;
        sub.finish()
    }

    fn list<'s>(&mut self, dest: &mut Value, elem: &Shape, v: &Validator, cur: &mut Cursor<'s>, first: Token<'s>) -> Result<(), DecodeError> {
        if first != Token::ArrayStart {
            return Err(self.unexpected(&Shape::List(Box::new(elem.clone())), &first));
        }
        let ev = v.element().cloned().ok_or_else(|| missing_child(v, "element"))?;
        let mut items = Vec::new();
        loop {
            self.path.push(Segment::Index(items.len()));
            let tok = cur.next_token().map_err(|e| e.located(&self.path))?;
            if tok == Token::ArrayEnd {
                self.path.pop();
                break;
            }
            let mut slot = Value::zero(elem);
            let out = self.value(&mut slot, elem, &ev, cur, tok, false);
            self.path.pop();
            out?;
            items.push(slot);
        }
        let len = items.len();
        *dest = Value::List(items);
        self.report_all(v.post_check(len));
        Ok(())
    }

    /// Parse and check one map key; reports at the entry's pointer.
    fn map_key(&mut self, key: &str, shape: &Shape, v: &Validator) -> Option<Value> {
        let target = shape.pointee();
        let scalar = match target {
            Shape::String | Shape::Bytes => Scalar::String(Cow::Borrowed(key)),
            Shape::Bool => match key {
                "true" => Scalar::Bool(true),
                "false" => Scalar::Bool(false),
                _ => Scalar::String(Cow::Borrowed(key)),
            },
            Shape::Int { .. } | Shape::Uint { .. } | Shape::Float { .. } => Scalar::Number(Cow::Borrowed(key)),
            _ => {
                self.report(ErrorKind::invalid_type(target.to_string(), "string"));
                return None;
            }
        };
        let errs = v.check(&scalar);
        if !errs.is_empty() {
            self.report_all(errs);
            return None;
        }
        match assign(target, &scalar) {
            Ok(value) => Some(value),
            Err(kind) => {
                self.report(kind);
                None
            }
        }
    }

    fn map<'s>(
        &mut self,
        dest: &mut Value,
        key_shape: &Shape,
        val_shape: &Shape,
        v: &Validator,
        cur: &mut Cursor<'s>,
        first: Token<'s>,
    ) -> Result<(), DecodeError> {
        if first != Token::ObjectStart {
            return Err(DecodeError::UnexpectedToken {
                pointer: self.path.clone(),
                expected: "object",
                found: first.kind(),
            });
        }
        let kv = v.key().cloned().ok_or_else(|| missing_child(v, "key"))?;
        let vv = v.value().cloned().ok_or_else(|| missing_child(v, "value"))?;
        let allow_dup = self.codec.options().allow_duplicate_keys;
        let mut entries: Vec<(Value, Value)> = Vec::new();
        let mut positions: HashMap<String, Option<usize>> = HashMap::new();
        loop {
            let key = match cur.next_token()? {
                Token::ObjectEnd => break,
                Token::String(k) => k.into_owned(),
                other => {
                    return Err(DecodeError::UnexpectedToken {
                        pointer: self.path.clone(),
                        expected: "member name",
                        found: other.kind(),
                    })
                }
            };
            self.path.push(Segment::Key(key.clone()));
            let first = cur.next_token().map_err(|e| e.located(&self.path))?;
            let parsed_key = self.map_key(&key, key_shape, &kv);
            // `"1"` and `"01"` are the same integer key.
            let identity = parsed_key.as_ref().map_or_else(|| key.clone(), key_identity);
            let previous = positions.get(&identity).copied();
            if previous.is_some() && !allow_dup {
                self.report(ErrorKind::DuplicateKey { key });
                let skipped = cur.skip_from(&first).map_err(|e| e.located(&self.path));
                self.path.pop();
                skipped?;
                continue;
            }
            let mut slot = Value::zero(val_shape);
            let out = self.value(&mut slot, val_shape, &vv, cur, first, false);
            self.path.pop();
            out?;
            let Some(k) = parsed_key else {
                positions.insert(identity, None);
                continue;
            };
            match previous.flatten() {
                Some(at) => entries[at] = (k, slot),
                None => {
                    positions.insert(identity, Some(entries.len()));
                    entries.push((k, slot));
                }
            }
        }
        let count = positions.len();
        *dest = Value::Map(entries);
        self.report_all(v.post_check(count));
        Ok(())
    }

    /// Validate an already materialized value.
    pub(crate) fn validate(&mut self, value: &Value, shape: &Shape, v: &Validator) -> Result<(), DecodeError> {
        self.validate_at(value, shape, v).map_err(|e| e.located(&self.path))
    }

    fn validate_at(&mut self, value: &Value, shape: &Shape, v: &Validator) -> Result<(), DecodeError> {
        if let Shape::Pointer(inner) = shape {
            if value.is_null() {
                if v.default_literal().is_none() {
                    if let Some(kind) = v.check_absent() {
                        self.report(kind);
                    }
                }
                return Ok(());
            }
            return self.validate(value, inner, v);
        }
        match (shape, value) {
            (Shape::Any, _) => Ok(()),
            (Shape::Record(rt), Value::Record(_)) => self.guarded(|d| d.validate_record(value, rt)),
            (Shape::List(elem), Value::List(items)) => {
                let ev = v.element().cloned().ok_or_else(|| missing_child(v, "element"))?;
                for (i, item) in items.iter().enumerate() {
                    self.path.push(Segment::Index(i));
                    let out = self.validate(item, elem, &ev);
                    self.path.pop();
                    out?;
                }
                self.report_all(v.post_check(items.len()));
                Ok(())
            }
            (Shape::Map(ks, vs), Value::Map(entries)) => {
                let kv = v.key().cloned().ok_or_else(|| missing_child(v, "key"))?;
                let vv = v.value().cloned().ok_or_else(|| missing_child(v, "value"))?;
                for (k, val) in entries {
                    let label = match value_scalar(k, ks.pointee()).as_ref().and_then(Scalar::text) {
                        Some(t) => t.to_string(),
                        None => String::new(),
                    };
                    self.path.push(Segment::Key(label));
                    self.validate(k, ks, &kv)?;
                    let out = self.validate(val, vs, &vv);
                    self.path.pop();
                    out?;
                }
                self.report_all(v.post_check(entries.len()));
                Ok(())
            }
            (_, Value::Null) => {
                if v.default_literal().is_none() {
                    if let Some(kind) = v.check_absent() {
                        self.report(kind);
                    }
                }
                Ok(())
            }
            (s, val) if s.is_scalar() => {
                match value_scalar(val, s) {
                    Some(scalar) => {
                        let errs = v.check(&scalar);
                        self.report_all(errs);
                    }
                    None => self.report(ErrorKind::invalid_type(s.to_string(), "container")),
                }
                Ok(())
            }
            (s, _) => {
                self.report(ErrorKind::invalid_type(s.to_string(), "value of another shape"));
                Ok(())
            }
        }
    }

    fn validate_record(&mut self, value: &Value, rt: &RecordType) -> Result<(), DecodeError> {
        let bound = self.codec.bound(rt)?;
        for (i, fd) in bound.schema.fields.iter().enumerate() {
            self.path.push(Segment::Key(fd.wire_name.clone()));
            let out = match value.slot(&fd.index) {
                Some(slot) => self.validate(slot, &fd.shape, &bound.validators[i]),
                None => self.validate(&Value::Null, &fd.shape, &bound.validators[i]),
            };
            self.path.pop();
            out?;
        }
        if let (Some(fd), Some(v)) = (&bound.schema.catch_all, &bound.catch_all) {
            if let Some(slot) = value.slot(&fd.index) {
                self.validate(slot, &fd.shape, v)?;
            }
        }
        Ok(())
    }
}
