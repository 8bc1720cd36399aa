//! Indexed field kinds and value-key derivation
//!
//! Supported kinds:
//! - string, number, boolean
//! - array:string, array:number, array:boolean
//!
//! Only values whose JSON type matches the element type of the kind are
//! indexed. Arrays are always expanded element by element and a scalar on
//! an array field counts as a one-element array.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Declared kind of an indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "array:string")]
    StringArray,
    #[serde(rename = "array:number")]
    NumberArray,
    #[serde(rename = "array:boolean")]
    BooleanArray,
}

impl FieldKind {
    /// Returns the type name used in configuration and errors
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::StringArray => "array:string",
            FieldKind::NumberArray => "array:number",
            FieldKind::BooleanArray => "array:boolean",
        }
    }

    /// Returns true for the array kinds
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FieldKind::StringArray | FieldKind::NumberArray | FieldKind::BooleanArray
        )
    }

    /// Returns true if element values are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Number | FieldKind::NumberArray)
    }

    /// Returns true if element values are strings
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldKind::String | FieldKind::StringArray)
    }

    /// Term mapping is only meaningful for string values
    pub fn supports_term_mapping(&self) -> bool {
        self.is_textual()
    }

    /// Returns true if a single (element) value has the kind's element type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String | FieldKind::StringArray => value.is_string(),
            FieldKind::Number | FieldKind::NumberArray => value.is_number(),
            FieldKind::Boolean | FieldKind::BooleanArray => value.is_boolean(),
        }
    }

    /// Element values of a record field that this kind indexes.
    ///
    /// Null and missing values yield nothing.
    pub fn element_values<'v>(&self, value: Option<&'v Value>) -> Vec<&'v Value> {
        match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter(|v| self.accepts(v)).collect(),
            Some(v) if self.accepts(v) => vec![v],
            Some(_) => Vec::new(),
        }
    }
}

/// Configuration of one indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Declared kind
    pub kind: FieldKind,
    /// Store interned term ids instead of literal strings
    #[serde(default)]
    pub term_mapping: bool,
}

impl FieldSpec {
    /// A plain (literal-keyed) field
    pub fn plain(kind: FieldKind) -> Self {
        Self {
            kind,
            term_mapping: false,
        }
    }

    /// A term-mapped field
    pub fn term_mapped(kind: FieldKind) -> Self {
        Self {
            kind,
            term_mapping: true,
        }
    }
}

/// Literal value-key for a scalar JSON value.
///
/// Strings map to themselves, numbers to [`number_key`] and booleans to
/// `"true"` / `"false"`. Other values have no key.
pub fn literal_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_key(n)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Canonical text of a number: one key per numeric value.
///
/// Integral values print as integers (`1.0` and `-0.0` become `1` and `0`),
/// everything else uses the shortest float text.
pub fn number_key(n: &Number) -> String {
    match integral(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

/// Orders two numbers by value. Equal exactly when their keys are equal.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (integral(a), integral(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

const MAX_INTEGRAL: f64 = 1e30;

fn integral(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i128::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(i128::from(u));
    }
    let f = n.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_INTEGRAL).then(|| f as i128)
}
