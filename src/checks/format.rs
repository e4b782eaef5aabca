//! Named string formats (`@email`, `@uuid`, ...) and the check that applies them.

use super::{expect_shape, invalid, parse_count, Interval};
use crate::ast::Rule;
use crate::compiler::CompileError;
use crate::error::{ErrorKind, Measure};
use crate::registry::Format;
use crate::shape::Shape;
use crate::validator::{Check, Scalar};
use base64::Engine as _;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, LazyLock};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email regex")
});

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").expect("uuid regex")
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("date regex"));

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:([0-5]\d|60)(\.\d+)?([Zz]|[+-]([01]\d|2[0-3]):[0-5]\d)?$").expect("time regex")
});

static HOSTNAME_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("hostname regex"));

static URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:[^\s]*$").expect("uri regex"));

static HEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]+$").expect("hex regex"));
static ALPHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]+$").expect("alpha regex"));
static ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("alnum regex"));
static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("numeric regex"));
static E164_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("e164 regex"));

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn check_date(s: &str) -> Result<(), String> {
    let caps = DATE_RE.captures(s).ok_or("expected YYYY-MM-DD")?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok()).unwrap_or(0);
    let (year, month, day) = (num(1), num(2), num(3));
    if !(1..=12).contains(&month) {
        return Err(format!("month {} out of range", month));
    }
    if day == 0 || day > days_in_month(year, month) {
        return Err(format!("day {} out of range", day));
    }
    Ok(())
}

fn check_time(s: &str) -> Result<(), String> {
    if TIME_RE.is_match(s) {
        Ok(())
    } else {
        Err("expected HH:MM:SS[.frac][offset]".to_string())
    }
}

fn check_date_time(s: &str) -> Result<(), String> {
    let (date, time) = s
        .split_once(['T', 't', ' '])
        .ok_or("expected date and time separated by T")?;
    check_date(date)?;
    check_time(time)?;
    if !time.ends_with(['Z', 'z']) && !time.contains(['+', '-']) {
        return Err("missing time zone offset".to_string());
    }
    Ok(())
}

fn check_hostname(s: &str) -> Result<(), String> {
    let s = s.strip_suffix('.').unwrap_or(s);
    if s.is_empty() || s.len() > 253 {
        return Err("hostname must be 1..253 characters".to_string());
    }
    match s.split('.').find(|label| !HOSTNAME_LABEL_RE.is_match(label)) {
        Some(label) => Err(format!("invalid label {:?}", label)),
        None => Ok(()),
    }
}

fn parsed<T: std::str::FromStr>(what: &'static str) -> impl Fn(&str) -> Result<(), String> {
    move |s| s.parse::<T>().map(|_| ()).map_err(|_| format!("not a valid {} address", what))
}

fn check_base64(s: &str) -> Result<(), String> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Every builtin format with its names.
pub fn builtin_formats() -> Vec<(Vec<&'static str>, Format)> {
    vec![
        (vec!["email"], Format::regex("email", EMAIL_RE.clone())),
        (vec!["uuid"], Format::regex("uuid", UUID_RE.clone())),
        (vec!["date"], Format::new("date", check_date)),
        (vec!["time"], Format::new("time", check_time)),
        (vec!["date-time", "datetime"], Format::new("date-time", check_date_time)),
        (vec!["ipv4"], Format::new("ipv4", parsed::<Ipv4Addr>("IPv4"))),
        (vec!["ipv6"], Format::new("ipv6", parsed::<Ipv6Addr>("IPv6"))),
        (vec!["ip"], Format::new("ip", parsed::<IpAddr>("IP"))),
        (vec!["hostname"], Format::new("hostname", check_hostname)),
        (vec!["uri", "url"], Format::regex("uri", URI_RE.clone())),
        (vec!["hex"], Format::regex("hex", HEX_RE.clone())),
        (vec!["base64"], Format::new("base64", check_base64)),
        (vec!["alpha"], Format::regex("alpha", ALPHA_RE.clone())),
        (vec!["alphanumeric", "alnum"], Format::regex("alphanumeric", ALNUM_RE.clone())),
        (vec!["numeric"], Format::regex("numeric", NUMERIC_RE.clone())),
        (vec!["e164", "phone"], Format::regex("e164", E164_RE.clone())),
    ]
}

#[derive(Debug)]
pub struct FormatCheck {
    format: Format,
    length: Interval<usize>,
}

/// Check for a rule naming a registered format, e.g. `@email[,254]`.
pub fn format_check(format: Format, rule: &Rule, shape: &Shape) -> Result<Arc<dyn Check>, CompileError> {
    expect_shape(rule, shape, matches!(shape, Shape::String))?;
    if !rule.params.is_empty() || rule.values.is_some() || rule.pattern.is_some() {
        return Err(invalid(rule, "formats accept only a length range"));
    }
    Ok(Arc::new(FormatCheck {
        format,
        length: Interval::parse(rule, rule.range.as_ref(), parse_count)?,
    }))
}

impl Check for FormatCheck {
    fn check(&self, token: &Scalar<'_>) -> Vec<ErrorKind> {
        let Scalar::String(s) = token else {
            return vec![ErrorKind::invalid_type("string", token.kind())];
        };
        let mut errs = Vec::new();
        if let Err(reason) = self.format.check(s) {
            errs.push(ErrorKind::InvalidFormat {
                format: self.format.name().to_string(),
                reason,
            });
        }
        errs.extend(self.length.check(Measure::Length, s.len(), s.len()));
        errs
    }
}
