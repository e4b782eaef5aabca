//! Codec: the entry point tying compiler, schema cache and options together.
//!
//! A `Codec` is built once and shared; every cache inside it is safe for concurrent use.
//! Each decode call owns its own cursor, destination and error list.

use crate::compiler::{CompileError, CompileHints, Compiler};
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::{DecodeError, EncodeError};
use crate::registry::Registry;
use crate::schema::{RecordSchema, SchemaCache, SchemaError};
use crate::shape::{RecordType, Shape};
use crate::token::Cursor;
use crate::validator::Validator;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Caller-selected decode behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Accept repeated object members / map keys (later value wins) instead of
    /// reporting `DuplicateKey`.
    pub allow_duplicate_keys: bool,
    /// Report `UnknownField` for members no field or catch-all claims.
    pub reject_unknown_fields: bool,
    /// Case-insensitive member matching for fields with `Casing::Default`.
    pub case_insensitive: bool,
    /// Container nesting limit; deeper input is a fatal `DepthExceeded`.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            allow_duplicate_keys: false,
            reject_unknown_fields: false,
            case_insensitive: false,
            max_depth: 128,
        }
    }
}

/// A record schema with one compiled validator per flattened field.
#[derive(Debug)]
pub struct BoundRecord {
    pub schema: Arc<RecordSchema>,
    /// Parallel to `schema.fields`.
    pub validators: Vec<Arc<Validator>>,
    pub catch_all: Option<Arc<Validator>>,
}

#[derive(Debug)]
pub struct Codec {
    compiler: Compiler,
    schemas: SchemaCache,
    records: RwLock<HashMap<String, Arc<BoundRecord>>>,
    options: DecodeOptions,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new()
    }
}

impl Codec {
    /// Codec with the builtin registry and default options.
    pub fn new() -> Self {
        Codec::with_registry(Arc::new(Registry::new()), DecodeOptions::default())
    }

    pub fn with_options(options: DecodeOptions) -> Self {
        Codec::with_registry(Arc::new(Registry::new()), options)
    }

    pub fn with_registry(registry: Arc<Registry>, options: DecodeOptions) -> Self {
        Codec {
            compiler: Compiler::new(registry),
            schemas: SchemaCache::new(),
            records: RwLock::new(HashMap::new()),
            options,
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.compiler.registry()
    }

    /// Validator for a (shape, rule text) pair; cached.
    pub fn compile(&self, shape: &Shape, rule: &str) -> Result<Arc<Validator>, CompileError> {
        self.compiler.compile(shape, rule)
    }

    /// Flattened field schema of a record type; cached by record name.
    pub fn schema(&self, rt: &RecordType) -> Result<Arc<RecordSchema>, SchemaError> {
        self.schemas.get_or_compute(rt)
    }

    pub(crate) fn bound(&self, rt: &RecordType) -> Result<Arc<BoundRecord>, CompileError> {
        if let Some(hit) = self.records.read().unwrap_or_else(PoisonError::into_inner).get(&rt.name) {
            return Ok(hit.clone());
        }
        let schema = self.schema(rt)?;
        let validators = schema
            .fields
            .iter()
            .map(|f| {
                let hints = CompileHints {
                    format: f.format.clone(),
                    optional: f.omit_empty || f.omit_zero,
                    default: f.default.clone(),
                };
                self.compiler.compile_with(&f.shape, &f.rule, &hints)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let catch_all = match &schema.catch_all {
            Some(f) => Some(self.compiler.compile(&f.shape, &f.rule)?),
            None => None,
        };
        let bound = Arc::new(BoundRecord {
            schema,
            validators,
            catch_all,
        });
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Ok(records.entry(rt.name.clone()).or_insert(bound).clone())
    }

    /// Decode one JSON value from `cursor` into `dest`, validating as it goes.
    ///
    /// Validation failures come back together as `DecodeError::Invalid`, with `dest` holding
    /// everything that did decode. Any other error is fatal and aborts the call.
    pub fn decode(
        &self,
        dest: &mut Value,
        shape: &Shape,
        cursor: &mut Cursor<'_>,
        validator: &Validator,
    ) -> Result<(), DecodeError> {
        let mut decoder = Decoder::new(self);
        let first = cursor.next_token()?;
        decoder.value(dest, shape, validator, cursor, first, false)?;
        cursor.finish()?;
        decoder.finish()
    }

    /// Compile `rule` for `shape` and decode `bytes` into a fresh value.
    ///
    /// All-or-nothing: on any error, validation failures included, the partially decoded
    /// value is dropped. Use [`Codec::decode_partial`] to keep it.
    pub fn decode_slice(&self, bytes: &[u8], shape: &Shape, rule: &str) -> Result<Value, DecodeError> {
        let (value, out) = self.decode_partial(bytes, shape, rule);
        out.map(|()| value)
    }

    pub fn decode_str(&self, json: &str, shape: &Shape, rule: &str) -> Result<Value, DecodeError> {
        self.decode_slice(json.as_bytes(), shape, rule)
    }

    /// Like [`Codec::decode_slice`], but always hands back the destination: complete with
    /// defaults on `Ok`, holding every valid part on `Invalid`, and best effort after a fatal
    /// error.
    pub fn decode_partial(&self, bytes: &[u8], shape: &Shape, rule: &str) -> (Value, Result<(), DecodeError>) {
        let mut dest = Value::zero(shape);
        let out = self.compile(shape, rule).map_err(DecodeError::from).and_then(|validator| {
            let mut cursor = Cursor::from_slice(bytes)?;
            self.decode(&mut dest, shape, &mut cursor, &validator)
        });
        (dest, out)
    }

    /// Apply the same rules to an already materialized value.
    pub fn validate_only(&self, value: &Value, shape: &Shape, validator: &Validator) -> Result<(), DecodeError> {
        let mut decoder = Decoder::new(self);
        decoder.validate(value, shape, validator)?;
        decoder.finish()
    }

    /// Encode a value as compact JSON following the shape's wire bindings.
    pub fn encode(&self, value: &Value, shape: &Shape) -> Result<String, EncodeError> {
        let mut encoder = Encoder::new(self);
        encoder.value(value, shape, false)?;
        Ok(encoder.into_string())
    }
}
