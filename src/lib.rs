//! # wirerule: rule language, validator compiler and schema-driven JSON decoding
//!
//! Turns untyped JSON into strongly shaped values while enforcing declarative rules, in a
//! single pass, and reports every validation problem with the pointer of the offending value
//! instead of stopping at the first one.
//!
//! ## Pieces
//!
//! - **Rule language** ([`parser`], [`ast`]): compact per-value constraints, parsed with PEST.
//! - **Registry and compiler** ([`registry`], [`compiler`], [`checks`]): rule name to
//!   provider, compiled validators cached per (shape, rule text).
//! - **Field schema** ([`shape`], [`schema`]): record declarations flattened into an
//!   indexed field list with inlined sub-records and an optional catch-all.
//! - **Decode engine** ([`codec`], [`token`]): shape-dispatched walk over a JSON cursor.
//!
//! ## Rule syntax
//!
//! ```text
//! @string[1,10]                 length 1..=10 (bytes)
//! @string<rune>(0,5]            length in runes, exclusive low bound
//! @int<8>[1,]                   8-bit signed, at least 1
//! @float<6,2>{%0.25}            6 digits, 2 decimals, multiple of 0.25
//! @string{A,B,'C D'}            one of the listed values
//! @string/^\w+$/                regex (`\/` escapes a slash)
//! @slice<@int[0,]>[1,5]         1..=5 elements, each >= 0
//! @map<@string[2,],@int>[1,]    at least one entry
//! @email?                       optional; named format
//! @uint<16>?='8080'             optional with default
//! ```
//!
//! ## Example
//!
//! ```
//! use wirerule::{Codec, FieldDef, RecordType, Shape};
//!
//! let shape = RecordType::new("Item")
//!     .field(FieldDef::new("name", Shape::String).rule("@string[1,5]"))
//!     .field(FieldDef::new("tags", Shape::list(Shape::String)))
//!     .into_shape();
//! let codec = Codec::new();
//! let value = codec.decode_str(r#"{"name":"ab","tags":["x"]}"#, &shape, "").unwrap();
//! assert_eq!(value.as_record().unwrap()[0].as_str(), Some("ab"));
//!
//! let err = codec.decode_str(r#"{"name":"abcdef"}"#, &shape, "").unwrap_err();
//! let errors = err.validation_errors().unwrap();
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors.as_slice()[0].pointer.to_string(), "/name");
//! ```

pub mod ast;
pub mod checks;
pub mod codec;
pub mod compiler;
mod decode;
mod encode;
pub mod error;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod shape;
pub mod token;
pub mod validator;
pub mod value;

pub use ast::Rule;
pub use codec::{Codec, DecodeOptions};
pub use compiler::{CompileError, CompileHints, Compiler};
pub use error::{DecodeError, EncodeError, ErrorKind, Measure, Pointer, Segment, ValidationError, ValidationErrors};
pub use parser::{parse, SyntaxError};
pub use registry::{Format, Registry};
pub use schema::{FieldDescriptor, RecordSchema, SchemaError};
pub use shape::{Casing, FieldDef, RecordType, Shape};
pub use token::{Cursor, Token};
pub use validator::{Check, Scalar, Validator};
pub use value::Value;
