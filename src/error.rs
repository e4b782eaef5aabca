//! Error model: path pointers, validation error kinds, and the fatal/non-fatal split.
//!
//! Validation errors ([`ValidationError`]) are collected and returned together; structural
//! errors ([`DecodeError`] variants other than `Invalid`) abort the decode call.

use crate::compiler::CompileError;
use crate::schema::SchemaError;
use std::fmt;

/// One step into a value tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Absolute location inside the decoded tree, rendered like an RFC 6901 pointer
/// (`/items/0/x`; the root is the empty string).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pointer(Vec<Segment>);

impl Pointer {
    pub fn root() -> Self {
        Pointer(Vec::new())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, seg: Segment) {
        self.0.push(seg);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(Segment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(Segment::Index(index));
        self
    }

    /// Prefix with an enclosing frame's pointer.
    pub fn within(mut self, parent: &Pointer) -> Self {
        let mut segs = parent.0.clone();
        segs.append(&mut self.0);
        Pointer(segs)
    }

    /// URI fragment form (`#/a%20b/0`).
    pub fn to_uri_fragment(&self) -> String {
        let mut out = String::from("#");
        for c in self.to_string().chars() {
            if c.is_ascii_alphanumeric() || "/-._~!$&'()*+,;=:@".contains(c) {
                out.push(c);
            } else {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", b));
                }
            }
        }
        out
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.0 {
            f.write_str("/")?;
            match seg {
                Segment::Index(i) => write!(f, "{}", i)?,
                Segment::Key(k) => {
                    for c in k.chars() {
                        match c {
                            '~' => f.write_str("~0")?,
                            '/' => f.write_str("~1")?,
                            _ => write!(f, "{}", c)?,
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// What an out-of-range check measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Value,
    Length,
    Count,
}

impl Measure {
    fn label(self) -> &'static str {
        match self {
            Measure::Value => "value",
            Measure::Length => "length",
            Measure::Count => "count",
        }
    }
}

/// Non-fatal validation failure kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    InvalidType {
        expected: String,
        found: String,
    },
    OutOfRange {
        measure: Measure,
        actual: String,
        min: Option<String>,
        max: Option<String>,
        exclusive_min: bool,
        exclusive_max: bool,
    },
    NotInEnum {
        values: Vec<String>,
    },
    PatternNotMatch {
        pattern: String,
    },
    MultipleOfViolation {
        multiple: String,
    },
    PrecisionExceeded {
        max_digits: u32,
        max_decimals: u32,
        digits: u32,
        decimals: u32,
    },
    InvalidFormat {
        format: String,
        reason: String,
    },
    MissingRequired,
    DuplicateKey {
        key: String,
    },
    UnknownField {
        name: String,
    },
}

impl ErrorKind {
    /// Stable discriminant for classification without string matching.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidType { .. } => "invalid_type",
            ErrorKind::OutOfRange { .. } => "out_of_range",
            ErrorKind::NotInEnum { .. } => "not_in_enum",
            ErrorKind::PatternNotMatch { .. } => "pattern_not_match",
            ErrorKind::MultipleOfViolation { .. } => "multiple_of",
            ErrorKind::PrecisionExceeded { .. } => "precision_exceeded",
            ErrorKind::InvalidFormat { .. } => "invalid_format",
            ErrorKind::MissingRequired => "missing_required",
            ErrorKind::DuplicateKey { .. } => "duplicate_key",
            ErrorKind::UnknownField { .. } => "unknown_field",
        }
    }

    pub fn invalid_type(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ErrorKind::InvalidType {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidType { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ErrorKind::OutOfRange {
                measure,
                actual,
                min,
                max,
                exclusive_min,
                exclusive_max,
            } => {
                write!(f, "{} {} out of range ", measure.label(), actual)?;
                let open = if *exclusive_min { '(' } else { '[' };
                let close = if *exclusive_max { ')' } else { ']' };
                write!(
                    f,
                    "{}{},{}{}",
                    open,
                    min.as_deref().unwrap_or(""),
                    max.as_deref().unwrap_or(""),
                    close
                )
            }
            ErrorKind::NotInEnum { values } => write!(f, "value not one of [{}]", values.join(", ")),
            ErrorKind::PatternNotMatch { pattern } => write!(f, "value does not match /{}/", pattern),
            ErrorKind::MultipleOfViolation { multiple } => write!(f, "value is not a multiple of {}", multiple),
            ErrorKind::PrecisionExceeded {
                max_digits,
                max_decimals,
                digits,
                decimals,
            } => write!(
                f,
                "{} digits with {} decimals exceeds {} digits with {} decimals",
                digits, decimals, max_digits, max_decimals
            ),
            ErrorKind::InvalidFormat { format, reason } => write!(f, "invalid {}: {}", format, reason),
            ErrorKind::MissingRequired => f.write_str("value is required"),
            ErrorKind::DuplicateKey { key } => write!(f, "duplicate key {:?}", key),
            ErrorKind::UnknownField { name } => write!(f, "unknown field {:?}", name),
        }
    }
}

/// A validation error tagged with the absolute pointer of the offending value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}: {kind}", display_pointer(.pointer))]
pub struct ValidationError {
    pub pointer: Pointer,
    pub kind: ErrorKind,
}

fn display_pointer(p: &Pointer) -> String {
    if p.is_root() {
        "(root)".to_string()
    } else {
        p.to_string()
    }
}

impl ValidationError {
    pub fn new(pointer: Pointer, kind: ErrorKind) -> Self {
        ValidationError { pointer, kind }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Ordered aggregate of validation errors from one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors(Vec::new())
    }

    pub fn push(&mut self, e: ValidationError) {
        self.0.push(e);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    /// First error at exactly this pointer (`"/items/0/x"`).
    pub fn at(&self, pointer: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.pointer.to_string() == pointer)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(v: Vec<ValidationError>) -> Self {
        ValidationErrors(v)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// One or more validation errors; the destination holds everything that did decode.
    #[error("validation failed: {0}")]
    Invalid(ValidationErrors),
    /// Malformed JSON; `pointer` is the innermost value being decoded when it was hit.
    #[error("{}: malformed JSON at byte {offset}: {message}", display_pointer(.pointer))]
    Syntax {
        pointer: Pointer,
        offset: usize,
        message: String,
    },
    #[error("{}: expected {expected}, found {found}", display_pointer(.pointer))]
    UnexpectedToken {
        pointer: Pointer,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{}: nesting exceeds depth {limit}", display_pointer(.pointer))]
    DepthExceeded { pointer: Pointer, limit: usize },
    /// Only ever raised after the root value is complete.
    #[error("trailing data after value at byte {offset}")]
    TrailingData { offset: usize },
    /// A rule or record declaration failed to compile; `pointer` is where it was needed.
    #[error("{}: {source}", display_pointer(.pointer))]
    Compile {
        pointer: Pointer,
        #[source]
        source: CompileError,
    },
}

impl DecodeError {
    /// Fatal errors abort the call; `Invalid` is the accumulated non-fatal set.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DecodeError::Invalid(_))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            DecodeError::Invalid(errs) => Some(errs),
            _ => None,
        }
    }

    /// Location of a fatal error. `TrailingData` is always at the root.
    pub fn pointer(&self) -> Option<&Pointer> {
        match self {
            DecodeError::Syntax { pointer, .. }
            | DecodeError::UnexpectedToken { pointer, .. }
            | DecodeError::DepthExceeded { pointer, .. }
            | DecodeError::Compile { pointer, .. } => Some(pointer),
            DecodeError::Invalid(_) | DecodeError::TrailingData { .. } => None,
        }
    }

    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        DecodeError::Syntax {
            pointer: Pointer::root(),
            offset,
            message: message.into(),
        }
    }

    /// Attach `path` to a syntax or compile error that has no location yet.
    pub(crate) fn located(mut self, path: &Pointer) -> Self {
        if let DecodeError::Syntax { pointer, .. } | DecodeError::Compile { pointer, .. } = &mut self {
            if pointer.is_root() {
                *pointer = path.clone();
            }
        }
        self
    }
}

impl From<CompileError> for DecodeError {
    fn from(source: CompileError) -> Self {
        DecodeError::Compile {
            pointer: Pointer::root(),
            source,
        }
    }
}

impl From<SchemaError> for DecodeError {
    fn from(e: SchemaError) -> Self {
        DecodeError::from(CompileError::Schema(e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("{}: value does not fit shape {expected}", display_pointer(.pointer))]
    Mismatch { pointer: Pointer, expected: String },
    #[error("{}: non-finite float cannot be encoded", display_pointer(.pointer))]
    NonFinite { pointer: Pointer },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
