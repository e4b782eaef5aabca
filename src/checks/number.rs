//! Boolean, integer and float checks.

use super::{expect_shape, invalid, mismatch, Interval};
use crate::ast::Rule;
use crate::compiler::CompileError;
use crate::error::{ErrorKind, Measure};
use crate::shape::Shape;
use crate::validator::{Check, Scalar};
use std::sync::Arc;

fn no_pattern(rule: &Rule) -> Result<(), CompileError> {
    match rule.pattern {
        Some(_) => Err(invalid(rule, "patterns apply to strings only")),
        None => Ok(()),
    }
}

#[derive(Debug)]
pub struct BoolCheck {
    one_of: Option<Vec<bool>>,
    literals: Vec<String>,
}

pub fn bool_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    expect_shape(rule, shape, matches!(shape, Shape::Bool))?;
    no_pattern(rule)?;
    if rule.range.is_some() || rule.multiple_of().is_some() || !rule.params.is_empty() {
        return Err(invalid(rule, "@bool takes only a value list"));
    }
    let one_of = match rule.one_of() {
        Some(items) => Some(
            items
                .iter()
                .map(|s| s.parse::<bool>().map_err(|_| invalid(rule, format!("{} is not a boolean", s))))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };
    Ok(Arc::new(BoolCheck {
        one_of,
        literals: rule.one_of().map(<[String]>::to_vec).unwrap_or_default(),
    }))
}

impl Check for BoolCheck {
    fn check(&self, token: &Scalar<'_>) -> Vec<ErrorKind> {
        let Scalar::Bool(b) = token else {
            return vec![ErrorKind::invalid_type("boolean", token.kind())];
        };
        match &self.one_of {
            Some(allowed) if !allowed.contains(b) => vec![ErrorKind::NotInEnum {
                values: self.literals.clone(),
            }],
            _ => Vec::new(),
        }
    }
}

/// Signed or unsigned integer of 1..=64 bits.
#[derive(Debug)]
pub struct IntCheck {
    signed: bool,
    bits: u8,
    min: i128,
    max: i128,
    range: Interval<i128>,
    one_of: Option<Vec<i128>>,
    literals: Vec<String>,
    multiple_of: Option<(i128, String)>,
}

pub fn int_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    integer(rule, shape, true)
}

pub fn uint_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    integer(rule, shape, false)
}

fn integer(rule: &Rule, shape: &Shape, signed: bool) -> Result<Arc<dyn Check>, CompileError> {
    let shape_bits = match (shape, signed) {
        (Shape::Int { bits }, true) | (Shape::Uint { bits }, false) if (1..=64).contains(bits) => *bits,
        _ => return Err(mismatch(rule, shape)),
    };
    no_pattern(rule)?;
    let bits = match (rule.params.len(), rule.param_literal(0)) {
        (0, _) => shape_bits,
        (1, Some(p)) => p
            .parse::<u8>()
            .ok()
            .filter(|b| (1..=64).contains(b))
            .ok_or_else(|| invalid(rule, "bit width must be 1..64"))?,
        _ => return Err(invalid(rule, "expected a single bit-width parameter")),
    };
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    let parse = |s: &str| s.parse::<i128>().ok();
    let range = Interval::parse(rule, rule.range.as_ref(), parse)?;
    let one_of = match rule.one_of() {
        Some(items) => Some(
            items
                .iter()
                .map(|s| parse(s).ok_or_else(|| invalid(rule, format!("{} is not an integer", s))))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };
    let multiple_of = match rule.multiple_of() {
        Some(m) => match parse(m) {
            Some(0) | None => return Err(invalid(rule, "multiple-of must be a non-zero integer")),
            Some(n) => Some((n, m.to_string())),
        },
        None => None,
    };
    Ok(Arc::new(IntCheck {
        signed,
        bits,
        min,
        max,
        range,
        one_of,
        literals: rule.one_of().map(<[String]>::to_vec).unwrap_or_default(),
        multiple_of,
    }))
}

impl IntCheck {
    fn type_name(&self) -> String {
        format!("{}{}", if self.signed { "int" } else { "uint" }, self.bits)
    }
}

impl Check for IntCheck {
    fn check(&self, token: &Scalar<'_>) -> Vec<ErrorKind> {
        let Scalar::Number(text) = token else {
            return vec![ErrorKind::invalid_type(self.type_name(), token.kind())];
        };
        let v = match text.parse::<i128>() {
            Ok(v) if v >= self.min && v <= self.max => v,
            _ => return vec![ErrorKind::invalid_type(self.type_name(), format!("number {}", text))],
        };
        if let Some(allowed) = &self.one_of {
            if allowed.contains(&v) {
                return Vec::new();
            }
            return vec![ErrorKind::NotInEnum {
                values: self.literals.clone(),
            }];
        }
        let mut errs = Vec::new();
        errs.extend(self.range.check(Measure::Value, v, text));
        if let Some((m, literal)) = &self.multiple_of {
            if v % m != 0 {
                errs.push(ErrorKind::MultipleOfViolation {
                    multiple: literal.clone(),
                });
            }
        }
        errs
    }
}

/// Floating point value with a digit budget.
#[derive(Debug)]
pub struct FloatCheck {
    bits: u8,
    max_digits: u32,
    max_decimals: u32,
    range: Interval<f64>,
    one_of: Option<Vec<f64>>,
    literals: Vec<String>,
    multiple_of: Option<(f64, String)>,
}

const DEFAULT_DECIMALS: u32 = 2;

pub fn float_check(rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    let bits = match shape {
        Shape::Float { bits: bits @ (32 | 64) } => bits,
        _ => return Err(mismatch(rule, shape)),
    };
    no_pattern(rule)?;
    let default_digits = if *bits == 32 { 7 } else { 15 };
    let param = |i: usize| -> Result<Option<u32>, CompileError> {
        match rule.params.get(i) {
            None => Ok(None),
            Some(_) => rule
                .param_literal(i)
                .and_then(|p| p.parse::<u32>().ok())
                .filter(|n| *n > 0 || i == 1)
                .map(Some)
                .ok_or_else(|| invalid(rule, "precision parameters must be non-negative integers")),
        }
    };
    if rule.params.len() > 2 {
        return Err(invalid(rule, "@float takes at most <digits,decimals>"));
    }
    let max_digits = param(0)?.unwrap_or(default_digits);
    let max_decimals = param(1)?.unwrap_or(DEFAULT_DECIMALS.min(max_digits));
    if max_decimals > max_digits {
        return Err(invalid(rule, "decimals cannot exceed total digits"));
    }
    let parse = |s: &str| s.parse::<f64>().ok().filter(|f| f.is_finite());
    let range = Interval::parse(rule, rule.range.as_ref(), parse)?;
    let one_of = match rule.one_of() {
        Some(items) => Some(
            items
                .iter()
                .map(|s| parse(s).ok_or_else(|| invalid(rule, format!("{} is not a number", s))))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };
    let multiple_of = match rule.multiple_of() {
        Some(m) => match parse(m) {
            Some(n) if n != 0.0 => Some((n, m.to_string())),
            _ => return Err(invalid(rule, "multiple-of must be a non-zero number")),
        },
        None => None,
    };
    Ok(Arc::new(FloatCheck {
        bits: *bits,
        max_digits,
        max_decimals,
        range,
        one_of,
        literals: rule.one_of().map(<[String]>::to_vec).unwrap_or_default(),
        multiple_of,
    }))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Integer-part and fractional digit counts of a decimal number text, ignoring sign,
/// leading zeros and trailing fractional zeros; the exponent shifts the decimal point.
pub fn count_digits(text: &str) -> (u32, u32) {
    let t = text.trim_start_matches(['-', '+']);
    let (mantissa, exp) = match t.find(['e', 'E']) {
        Some(i) => (&t[..i], exponent(&t[i + 1..])),
        None => (t, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all: String = int_part.chars().chain(frac_part.chars()).collect();
    let trimmed = all.trim_start_matches('0');
    let point = (int_part.len() as i64)
        .saturating_add(exp)
        .saturating_sub((all.len() - trimmed.len()) as i64);
    let significant = trimmed.trim_end_matches('0');
    let len = significant.len() as i64;
    if len == 0 {
        return (0, 0);
    }
    let (int_digits, decimals) = if point >= len {
        (point, 0)
    } else if point <= 0 {
        (0, len.saturating_sub(point))
    } else {
        (point, len - point)
    };
    (int_digits.clamp(0, u32::MAX as i64) as u32, decimals.clamp(0, u32::MAX as i64) as u32)
}

/// Decimal exponent, saturating when it does not fit an `i64`.
fn exponent(text: &str) -> i64 {
    text.parse::<i64>().unwrap_or(if text.starts_with('-') { i64::MIN } else { i64::MAX })
}

impl FloatCheck {
    fn type_name(&self) -> String {
        format!("float{}", self.bits)
    }
}

impl Check for FloatCheck {
    fn check(&self, token: &Scalar<'_>) -> Vec<ErrorKind> {
        let Scalar::Number(text) = token else {
            return vec![ErrorKind::invalid_type(self.type_name(), token.kind())];
        };
        let v = match text.parse::<f64>() {
            Ok(v) if v.is_finite() && (self.bits != 32 || v.abs() <= f32::MAX as f64) => v,
            _ => return vec![ErrorKind::invalid_type(self.type_name(), format!("number {}", text))],
        };
        if let Some(allowed) = &self.one_of {
            if allowed.iter().any(|a| close(*a, v)) {
                return Vec::new();
            }
            return vec![ErrorKind::NotInEnum {
                values: self.literals.clone(),
            }];
        }
        let mut errs = Vec::new();
        let (int_digits, decimals) = count_digits(text);
        if int_digits + decimals > self.max_digits || decimals > self.max_decimals {
            errs.push(ErrorKind::PrecisionExceeded {
                max_digits: self.max_digits,
                max_decimals: self.max_decimals,
                digits: int_digits + decimals,
                decimals,
            });
        }
        errs.extend(self.range.check(Measure::Value, v, text));
        if let Some((m, literal)) = &self.multiple_of {
            let q = v / m;
            if (q - q.round()).abs() > 1e-9 {
                errs.push(ErrorKind::MultipleOfViolation {
                    multiple: literal.clone(),
                });
            }
        }
        errs
    }
}
