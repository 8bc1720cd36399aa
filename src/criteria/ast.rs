//! Criteria tree
//!
//! Parsed once from caller JSON and never mutated afterwards.

use std::collections::BTreeSet;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};

use super::errors::{CriteriaError, CriteriaResult};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl CmpOp {
    /// Canonical operator name
    pub fn op_name(&self) -> &'static str {
        match self {
            CmpOp::Gt => "$gt",
            CmpOp::Gte => "$gte",
            CmpOp::Lt => "$lt",
            CmpOp::Lte => "$lte",
            CmpOp::Ne => "$ne",
        }
    }

    /// Applies an ordering comparison. `Ne` is not an ordering and yields false.
    pub fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Gt => ordering == Greater,
            CmpOp::Gte => ordering != Less,
            CmpOp::Lt => ordering == Less,
            CmpOp::Lte => ordering != Greater,
            CmpOp::Ne => false,
        }
    }
}

/// Compiled regular expression with its source and flags
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    options: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern. Supported options: `i`, `m`, `s`, `x`.
    pub fn new(source: &str, options: &str) -> CriteriaResult<Self> {
        let mut builder = RegexBuilder::new(source);
        for flag in options.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => return Err(CriteriaError::InvalidRegexOption(other)),
            };
        }
        let regex = builder
            .build()
            .map_err(|e| CriteriaError::InvalidRegex {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            options: options.to_string(),
            regex,
        })
    }

    /// Pattern source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Option flags as given
    pub fn options(&self) -> &str {
        &self.options
    }

    /// Returns true if the pattern matches anywhere in `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.options == other.options
    }
}

/// Per-field predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Some element equals the value
    Eq(Value),
    /// Some element equals one of the values
    In(Vec<Value>),
    /// No element equals any of the values
    Nin(Vec<Value>),
    /// Every value is equal to some element
    All(Vec<Value>),
    /// Some element equals the value (array membership)
    Contains(Value),
    /// Ordering comparison, or `$ne`
    Cmp(CmpOp, Value),
    /// Some string element matches
    Regex(Pattern),
    /// Field is an array of exactly this length
    Size(usize),
    /// Field is present (possibly null) or absent
    Exists(bool),
    /// The wrapped predicate does not hold
    Not(Box<Predicate>),
}

impl Predicate {
    /// Operator name for explain output
    pub fn op_name(&self) -> &'static str {
        match self {
            Predicate::Eq(_) => "$eq",
            Predicate::In(_) => "$in",
            Predicate::Nin(_) => "$nin",
            Predicate::All(_) => "$all",
            Predicate::Contains(_) => "$contains",
            Predicate::Cmp(op, _) => op.op_name(),
            Predicate::Regex(_) => "$regex",
            Predicate::Size(_) => "$size",
            Predicate::Exists(_) => "$exists",
            Predicate::Not(_) => "$not",
        }
    }

    /// Returns true if a regular expression appears anywhere inside
    pub fn contains_regex(&self) -> bool {
        match self {
            Predicate::Regex(_) => true,
            Predicate::Not(inner) => inner.contains_regex(),
            _ => false,
        }
    }

    /// JSON form of the operand(s), as accepted by the parser
    pub fn to_value(&self) -> Value {
        match self {
            Predicate::Eq(v) => json!({ "$eq": v }),
            Predicate::In(vs) => json!({ "$in": vs }),
            Predicate::Nin(vs) => json!({ "$nin": vs }),
            Predicate::All(vs) => json!({ "$all": vs }),
            Predicate::Contains(v) => json!({ "$contains": v }),
            Predicate::Cmp(op, v) => {
                let mut map = Map::new();
                map.insert(op.op_name().to_string(), v.clone());
                Value::Object(map)
            }
            Predicate::Regex(p) if p.options().is_empty() => json!({ "$regex": p.source() }),
            Predicate::Regex(p) => json!({ "$regex": p.source(), "$options": p.options() }),
            Predicate::Size(n) => json!({ "$size": n }),
            Predicate::Exists(b) => json!({ "$exists": b }),
            Predicate::Not(inner) => json!({ "$not": inner.to_value() }),
        }
    }
}

/// A predicate applied to one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    /// Field name
    pub field: String,
    /// Predicate on the field's value
    pub predicate: Predicate,
}

/// Criteria tree
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// All branches hold. Empty matches everything.
    And(Vec<Criteria>),
    /// Some branch holds
    Or(Vec<Criteria>),
    /// The wrapped criteria does not hold
    Not(Box<Criteria>),
    /// Field predicate
    Field(FieldPredicate),
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::all()
    }
}

impl Criteria {
    /// Criteria that matches every record
    pub fn all() -> Self {
        Criteria::And(Vec::new())
    }

    /// Field predicate
    pub fn field(field: impl Into<String>, predicate: Predicate) -> Self {
        Criteria::Field(FieldPredicate {
            field: field.into(),
            predicate,
        })
    }

    /// Equality on a field
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::field(field, Predicate::Eq(value))
    }

    /// `$in` on a field
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::field(field, Predicate::In(values))
    }

    /// `$all` on a field
    pub fn all_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::field(field, Predicate::All(values))
    }

    /// Comparison on a field
    pub fn cmp(field: impl Into<String>, op: CmpOp, value: Value) -> Self {
        Self::field(field, Predicate::Cmp(op, value))
    }

    /// Conjunction
    pub fn and(branches: Vec<Criteria>) -> Self {
        Criteria::And(branches)
    }

    /// Disjunction
    pub fn or(branches: Vec<Criteria>) -> Self {
        Criteria::Or(branches)
    }

    /// Negation
    pub fn negate(inner: Criteria) -> Self {
        Criteria::Not(Box::new(inner))
    }

    /// Parses caller JSON
    pub fn parse(value: &Value) -> CriteriaResult<Self> {
        super::parser::parse(value)
    }

    /// Returns true if the criteria matches everything
    pub fn is_empty(&self) -> bool {
        match self {
            Criteria::And(branches) => branches.iter().all(Criteria::is_empty),
            _ => false,
        }
    }

    /// Returns true if a regular expression appears anywhere
    pub fn contains_regex(&self) -> bool {
        match self {
            Criteria::And(bs) | Criteria::Or(bs) => bs.iter().any(Criteria::contains_regex),
            Criteria::Not(inner) => inner.contains_regex(),
            Criteria::Field(fp) => fp.predicate.contains_regex(),
        }
    }

    /// Returns true if an `$or` appears anywhere
    pub fn contains_or(&self) -> bool {
        match self {
            Criteria::Or(_) => true,
            Criteria::And(bs) => bs.iter().any(Criteria::contains_or),
            Criteria::Not(inner) => inner.contains_or(),
            Criteria::Field(_) => false,
        }
    }

    /// Every field referenced, in order
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Criteria::And(bs) | Criteria::Or(bs) => {
                for b in bs {
                    b.collect_fields(out);
                }
            }
            Criteria::Not(inner) => inner.collect_fields(out),
            Criteria::Field(fp) => {
                out.insert(fp.field.as_str());
            }
        }
    }

    /// Conjunction of two criteria, flattening nested `$and`
    pub fn conjoin(self, other: Criteria) -> Criteria {
        let mut branches = match self {
            Criteria::And(bs) => bs,
            c => vec![c],
        };
        match other {
            Criteria::And(bs) => branches.extend(bs),
            c => branches.push(c),
        }
        if branches.len() == 1 {
            branches.pop().unwrap_or_default()
        } else {
            Criteria::And(branches)
        }
    }

    /// JSON form, as accepted by the parser
    pub fn to_value(&self) -> Value {
        match self {
            Criteria::And(bs) if bs.is_empty() => json!({}),
            Criteria::And(bs) => json!({ "$and": bs.iter().map(Criteria::to_value).collect::<Vec<_>>() }),
            Criteria::Or(bs) => json!({ "$or": bs.iter().map(Criteria::to_value).collect::<Vec<_>>() }),
            Criteria::Not(inner) => json!({ "$not": inner.to_value() }),
            Criteria::Field(fp) => {
                let mut map = Map::new();
                map.insert(fp.field.clone(), fp.predicate.to_value());
                Value::Object(map)
            }
        }
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
