//! Attribute query terms.
//!
//! Numeric attributes accept an exact value (`42`), an open range (`<5`,
//! `>5`, both exclusive) or a bracketed range where `[`/`]` include and
//! `<`/`>` exclude the bound (`[1;9]`, `<1;9>`, `[1;9>`). A bound may be
//! left empty (`[;9]`). String attributes match a word case-insensitively,
//! or a prefix when the term ends with `*`.

use std::ops::Bound;

use crate::config::ValueKind;
use crate::error::{AttributeError, Result};

/// Inclusive 64-bit integer range describing a term for planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int64Range {
    lower: i64,
    upper: i64,
    valid: bool,
}

impl Int64Range {
    pub fn new(lower: i64, upper: i64) -> Self {
        Int64Range {
            lower,
            upper,
            valid: true,
        }
    }

    /// A well formed range matching nothing.
    pub fn empty() -> Self {
        Int64Range::new(1, 0)
    }

    /// Marker for terms that have no integer interpretation.
    pub fn invalid() -> Self {
        Int64Range {
            lower: 1,
            upper: 0,
            valid: false,
        }
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    pub fn upper(&self) -> i64 {
        self.upper
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    pub fn contains(&self, value: i64) -> bool {
        self.valid && self.lower <= value && value <= self.upper
    }
}

/// Floating point range with inclusive or exclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatRange {
    pub lower: Bound<f64>,
    pub upper: Bound<f64>,
}

impl FloatRange {
    /// NaN never matches.
    pub fn contains(&self, value: f64) -> bool {
        let above = match self.lower {
            Bound::Included(lower) => value >= lower,
            Bound::Excluded(lower) => value > lower,
            Bound::Unbounded => !value.is_nan(),
        };
        let below = match self.upper {
            Bound::Included(upper) => value <= upper,
            Bound::Excluded(upper) => value < upper,
            Bound::Unbounded => !value.is_nan(),
        };
        above && below
    }

    /// Smallest candidate value, for dictionary positioning.
    pub fn start(&self) -> f64 {
        match self.lower {
            Bound::Included(lower) | Bound::Excluded(lower) => lower,
            Bound::Unbounded => f64::NEG_INFINITY,
        }
    }

    /// True when `value` and every larger value lie above the range.
    pub fn is_beyond(&self, value: f64) -> bool {
        match self.upper {
            Bound::Included(upper) => !(value <= upper),
            Bound::Excluded(upper) => !(value < upper),
            Bound::Unbounded => value.is_nan(),
        }
    }

    /// Integers inside the range.
    pub fn as_integer_range(&self) -> Int64Range {
        let lower = match self.lower {
            Bound::Included(lower) => lower.ceil() as i128,
            Bound::Excluded(lower) => (lower.floor() as i128).saturating_add(1),
            Bound::Unbounded => i64::MIN as i128,
        };
        let upper = match self.upper {
            Bound::Included(upper) => upper.floor() as i128,
            Bound::Excluded(upper) => (upper.ceil() as i128).saturating_sub(1),
            Bound::Unbounded => i64::MAX as i128,
        };
        clamp_range(lower, upper)
    }
}

/// A parsed attribute term.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTerm {
    /// Integer attribute: values inside the range.
    Integer(Int64Range),
    /// Float attribute: values inside the range.
    Float(FloatRange),
    /// String attribute: values equal to the word, ignoring case.
    Word(String),
    /// String attribute: values starting with the prefix, ignoring case.
    Prefix(String),
    /// Malformed term; matches nothing.
    Invalid(String),
}

impl QueryTerm {
    /// Parse `term` for an attribute holding values of `kind`. Malformed
    /// terms become [`QueryTerm::Invalid`].
    pub fn parse(term: &str, kind: ValueKind) -> QueryTerm {
        let parsed = match kind {
            ValueKind::Integer => parse_integer(term).map(QueryTerm::Integer),
            ValueKind::Float => parse_float(term).map(QueryTerm::Float),
            ValueKind::String => Some(parse_string(term)),
        };
        parsed.unwrap_or_else(|| QueryTerm::Invalid(term.to_string()))
    }

    /// Parse `term`, failing on malformed input.
    pub fn try_parse(term: &str, kind: ValueKind) -> Result<QueryTerm> {
        match QueryTerm::parse(term, kind) {
            QueryTerm::Invalid(term) => Err(AttributeError::query(format!(
                "malformed {kind:?} term '{term}'"
            ))),
            parsed => Ok(parsed),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, QueryTerm::Invalid(_))
    }

    /// Inclusive integer interpretation of a numeric term.
    pub fn as_integer_range(&self) -> Int64Range {
        match self {
            QueryTerm::Integer(range) => *range,
            QueryTerm::Float(range) => range.as_integer_range(),
            _ => Int64Range::invalid(),
        }
    }
}

fn parse_string(term: &str) -> QueryTerm {
    match term.strip_suffix('*') {
        Some(prefix) => QueryTerm::Prefix(prefix.to_string()),
        None => QueryTerm::Word(term.to_string()),
    }
}

/// Split a numeric term into its bounds.
fn split_bounds(term: &str) -> Option<(Bound<&str>, Bound<&str>)> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let first = term.as_bytes()[0];
    let last = term.as_bytes()[term.len() - 1];
    if term.len() >= 2
        && matches!(first, b'[' | b'<')
        && matches!(last, b']' | b'>')
        && term.contains(';')
    {
        let (lower, upper) = term[1..term.len() - 1].split_once(';')?;
        let lower = bound(lower.trim(), first == b'[');
        let upper = bound(upper.trim(), last == b']');
        return Some((lower, upper));
    }
    if let Some(upper) = term.strip_prefix('<') {
        return Some((Bound::Unbounded, Bound::Excluded(upper.trim())));
    }
    if let Some(lower) = term.strip_prefix('>') {
        return Some((Bound::Excluded(lower.trim()), Bound::Unbounded));
    }
    Some((Bound::Included(term), Bound::Included(term)))
}

fn bound(text: &str, inclusive: bool) -> Bound<&str> {
    if text.is_empty() {
        Bound::Unbounded
    } else if inclusive {
        Bound::Included(text)
    } else {
        Bound::Excluded(text)
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| !value.is_nan())
}

fn parse_integer(term: &str) -> Option<Int64Range> {
    let (lower, upper) = split_bounds(term)?;
    let lower = match lower {
        Bound::Unbounded => i64::MIN as i128,
        Bound::Included(text) => match text.parse::<i64>() {
            Ok(value) => value as i128,
            Err(_) => parse_number(text)?.ceil() as i128,
        },
        Bound::Excluded(text) => match text.parse::<i64>() {
            Ok(value) => value as i128 + 1,
            Err(_) => (parse_number(text)?.floor() as i128).saturating_add(1),
        },
    };
    let upper = match upper {
        Bound::Unbounded => i64::MAX as i128,
        Bound::Included(text) => match text.parse::<i64>() {
            Ok(value) => value as i128,
            Err(_) => parse_number(text)?.floor() as i128,
        },
        Bound::Excluded(text) => match text.parse::<i64>() {
            Ok(value) => value as i128 - 1,
            Err(_) => (parse_number(text)?.ceil() as i128).saturating_sub(1),
        },
    };
    Some(clamp_range(lower, upper))
}

fn parse_float(term: &str) -> Option<FloatRange> {
    let (lower, upper) = split_bounds(term)?;
    let convert = |bound: Bound<&str>| -> Option<Bound<f64>> {
        Some(match bound {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(text) => Bound::Included(parse_number(text)?),
            Bound::Excluded(text) => Bound::Excluded(parse_number(text)?),
        })
    };
    Some(FloatRange {
        lower: convert(lower)?,
        upper: convert(upper)?,
    })
}

fn clamp_range(lower: i128, upper: i128) -> Int64Range {
    if lower > upper || lower > i64::MAX as i128 || upper < i64::MIN as i128 {
        return Int64Range::empty();
    }
    let lower = lower.max(i64::MIN as i128) as i64;
    let upper = upper.min(i64::MAX as i128) as i64;
    Int64Range::new(lower, upper)
}
