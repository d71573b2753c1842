//! Attribute values, folding and comparators.
//!
//! Values are ordered by their folded form first and by their raw form
//! second. Raw values that fold to the same canonical value are therefore
//! adjacent in the dictionary and can share one posting list.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ValueKind;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            AttributeValue::Integer(_) => ValueKind::Integer,
            AttributeValue::Float(_) => ValueKind::Float,
            AttributeValue::String(_) => ValueKind::String,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            AttributeValue::Integer(_) => 0,
            AttributeValue::Float(_) => 1,
            AttributeValue::String(_) => 2,
        }
    }

    /// Numeric view of the value, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::String(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Compare canonical (folded) forms.
    pub fn cmp_folded(&self, other: &AttributeValue) -> Ordering {
        match (self, other) {
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => a.cmp(b),
            (AttributeValue::Float(a), AttributeValue::Float(b)) => {
                fold_float(*a).total_cmp(&fold_float(*b))
            }
            (AttributeValue::String(a), AttributeValue::String(b)) => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    /// Dictionary order: folded form, then raw form.
    pub fn cmp_exact(&self, other: &AttributeValue) -> Ordering {
        self.cmp_folded(other).then_with(|| match (self, other) {
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.total_cmp(b),
            (AttributeValue::String(a), AttributeValue::String(b)) => a.cmp(b),
            _ => Ordering::Equal,
        })
    }

    /// True when the two values fold to different canonical values.
    pub fn folded_change(&self, other: &AttributeValue) -> bool {
        self.cmp_folded(other) != Ordering::Equal
    }
}

fn fold_float(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

/// A value together with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedValue {
    pub value: AttributeValue,
    pub weight: i32,
}

impl WeightedValue {
    pub fn new<V: Into<AttributeValue>>(value: V, weight: i32) -> Self {
        WeightedValue {
            value: value.into(),
            weight,
        }
    }
}

/// Ordering used when searching the dictionary.
pub trait EnumComparator {
    fn compare(&self, a: &AttributeValue, b: &AttributeValue) -> Ordering;
}

/// Compares folded forms; a lower bound lands on the first entry of a group.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldedComparator;

impl EnumComparator for FoldedComparator {
    fn compare(&self, a: &AttributeValue, b: &AttributeValue) -> Ordering {
        a.cmp_folded(b)
    }
}

/// Compares raw values in dictionary order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactComparator;

impl EnumComparator for ExactComparator {
    fn compare(&self, a: &AttributeValue, b: &AttributeValue) -> Ordering {
        a.cmp_exact(b)
    }
}
