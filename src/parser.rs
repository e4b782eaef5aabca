//! Parse rule text into the [`Rule`] AST using PEST.

use crate::ast::{Bound, Param, Range, Rule, Values};
use pest::iterators::Pair;
use pest::Parser;

mod grammar {
    use pest_derive::Parser as PestParser;

    #[derive(PestParser)]
    #[grammar = "grammar.pest"]
    pub struct RuleParser;
}

use grammar::{Rule as G, RuleParser};

/// Malformed rule text. `offset` is a byte offset into the input and `fragment` the text
/// from there on (truncated), so callers can point at the offending part.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("syntax error at offset {offset} near `{fragment}`: {message}")]
pub struct SyntaxError {
    pub offset: usize,
    pub fragment: String,
    pub message: String,
}

const FRAGMENT_MAX: usize = 24;

impl SyntaxError {
    fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(source.len());
        let mut end = (offset + FRAGMENT_MAX).min(source.len());
        while !source.is_char_boundary(end) {
            end -= 1;
        }
        let mut start = offset;
        while !source.is_char_boundary(start) {
            start -= 1;
        }
        let fragment = if start == source.len() {
            "<end of input>".to_string()
        } else {
            source[start..end].to_string()
        };
        SyntaxError {
            offset,
            fragment,
            message: message.into(),
        }
    }
}

/// Parse a rule such as `@string[1,10]?` or `@int<8>{1,2,3}='1'`.
pub fn parse(source: &str) -> Result<Rule, SyntaxError> {
    let mut pairs = RuleParser::parse(G::rule_text, source).map_err(|e| {
        let offset = match e.location {
            pest::error::InputLocation::Pos(p) => p,
            pest::error::InputLocation::Span((s, _)) => s,
        };
        SyntaxError::at(source, offset, e.variant.message())
    })?;
    let pair = pairs
        .next()
        .ok_or_else(|| SyntaxError::at(source, 0, "empty rule"))?;
    build_rule(source, pair)
}

fn build_rule(source: &str, pair: Pair<G>) -> Result<Rule, SyntaxError> {
    let mut rule = Rule::new(String::new());
    for inner in pair.into_inner() {
        match inner.as_rule() {
            G::name => rule.name = inner.as_str().trim_start_matches('@').to_string(),
            G::params => {
                for p in inner.into_inner() {
                    let param = match p.as_rule() {
                        G::rule => Param::Rule(build_rule(source, p)?),
                        G::quoted => Param::Literal(unquote(p)),
                        _ => Param::Literal(p.as_str().to_string()),
                    };
                    rule.params.push(param);
                }
            }
            G::range => rule.range = Some(build_range(source, inner)?),
            G::values => rule.values = Some(build_values(inner)),
            G::pattern => {
                let raw = inner.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                rule.pattern = Some(unescape_pattern(raw));
            }
            G::optional_mark => rule.optional = true,
            G::default_value => {
                let lit = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| SyntaxError::at(source, source.len(), "missing default literal"))?;
                rule.default = Some(match lit.as_rule() {
                    G::quoted => unquote(lit),
                    _ => lit.as_str().to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(rule)
}

fn build_range(source: &str, pair: Pair<G>) -> Result<Range, SyntaxError> {
    let start = pair.as_span().start();
    let mut low_exclusive = false;
    let mut high_exclusive = false;
    let mut range = Range::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            G::range_open => low_exclusive = inner.as_str() == "(",
            G::range_close => high_exclusive = inner.as_str() == ")",
            G::low => range.low = Some(bound_of(inner)),
            G::high => range.high = Some(bound_of(inner)),
            G::exact => range = Range::exact(inner.as_str().trim()),
            _ => {}
        }
    }
    if let Some(low) = range.low.as_mut() {
        low.exclusive = low_exclusive;
    }
    if let Some(high) = range.high.as_mut() {
        high.exclusive = high_exclusive;
    }
    if let (Some(low), Some(high)) = (&range.low, &range.high) {
        let (l, h) = (low.value.parse::<f64>(), high.value.parse::<f64>());
        if let (Ok(l), Ok(h)) = (l, h) {
            let empty = l > h || (l == h && (low.exclusive || high.exclusive));
            if empty {
                return Err(SyntaxError::at(source, start, "empty range"));
            }
        }
    }
    Ok(range)
}

fn bound_of(pair: Pair<G>) -> Bound {
    Bound {
        value: pair.as_str().trim().to_string(),
        exclusive: false,
    }
}

fn build_values(pair: Pair<G>) -> Values {
    let mut items = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            G::multiple_of => {
                let n = inner.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                return Values::MultipleOf(n.to_string());
            }
            G::quoted => items.push(unquote(inner)),
            G::bare => items.push(inner.as_str().to_string()),
            _ => {}
        }
    }
    Values::OneOf(items)
}

fn unquote(pair: Pair<G>) -> String {
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(n @ ('\'' | '\\')) => out.push(n),
                Some(n) => {
                    out.push('\\');
                    out.push(n);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `\/` becomes `/`; every other escape is regex syntax and is kept.
fn unescape_pattern(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('/') => out.push('/'),
                Some(n) => {
                    out.push('\\');
                    out.push(n);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
