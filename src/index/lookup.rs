//! Index-assisted lookup
//!
//! Resolves criteria to position sets using posting lists only.
//!
//! Supported forms:
//! - equality, `$in`, `$contains`: union of posting lists
//! - `$nin`, `$ne`, `$not`: complement against `[0, total_positions)`
//! - `$all`: intersection (empty list matches everything)
//! - ordering comparisons on numeric fields: scan of the field's keys
//! - `$and`: intersection of branches
//!
//! `$or`, regular expressions, `$size` and `$exists` are reported through
//! `Lookup::CannotIndex`, as are operands whose JSON type differs from the
//! field kind. Results are exact: no residual check is needed for the
//! resolved part.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Number, Value};

use crate::criteria::{CmpOp, Criteria, Predicate};
use crate::storage::Position;

use super::field_type::compare_numbers;
use super::manager::{FieldIndex, FieldPostings};
use super::posting::PostingList;
use super::resolver::ValueResolver;

/// Ordered set of logical positions
pub type PositionSet = BTreeSet<Position>;

/// Why a criteria cannot be answered from the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CannotIndexReason {
    /// Field is not configured as indexed
    NotIndexed,
    /// Operator has no index implementation for this field
    Operator(&'static str),
    /// Operand JSON type differs from the field's element type
    OperandType { expected: &'static str },
    /// `$or` is resolved by the planner, branch by branch
    Disjunction,
}

/// Signal that the index cannot resolve a criteria
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannotIndex {
    /// Field involved, if any
    pub field: Option<String>,
    /// Reason
    pub reason: CannotIndexReason,
}

impl CannotIndex {
    fn on(field: &str, reason: CannotIndexReason) -> Self {
        Self {
            field: Some(field.to_string()),
            reason,
        }
    }
}

impl fmt::Display for CannotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.field.as_deref().unwrap_or("<criteria>");
        match &self.reason {
            CannotIndexReason::NotIndexed => write!(f, "field '{}' is not indexed", field),
            CannotIndexReason::Operator(op) => {
                write!(f, "operator {} on '{}' is not index-resolvable", op, field)
            }
            CannotIndexReason::OperandType { expected } => {
                write!(f, "operand for '{}' is not a {}", field, expected)
            }
            CannotIndexReason::Disjunction => write!(f, "$or is resolved per branch"),
        }
    }
}

/// Result of an index lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Exact set of matching positions
    Positions(PositionSet),
    /// The index cannot answer; evaluate by scanning
    CannotIndex(CannotIndex),
}

impl Lookup {
    /// Positions, if the index could answer
    pub fn positions(self) -> Option<PositionSet> {
        match self {
            Lookup::Positions(p) => Some(p),
            Lookup::CannotIndex(_) => None,
        }
    }

    /// Returns true if the index answered
    pub fn is_indexed(&self) -> bool {
        matches!(self, Lookup::Positions(_))
    }
}

/// Lookup parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    /// Universe size for complements
    pub total_positions: Position,
    /// Compare strings ignoring case
    pub case_insensitive: bool,
}

impl LookupOptions {
    /// Case-sensitive lookup over `[0, total_positions)`
    pub fn new(total_positions: Position) -> Self {
        Self {
            total_positions,
            case_insensitive: false,
        }
    }

    /// Sets case-insensitive matching
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }
}

/// Options for `FieldIndex::exists`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistsOptions {
    /// Every value must be held by the same record
    pub all: bool,
    /// Compare strings ignoring case
    pub case_insensitive: bool,
    /// Positions that do not count (e.g. the record being updated)
    pub excludes: Vec<Position>,
}

type LookupResult<T> = Result<T, CannotIndex>;

impl FieldIndex {
    /// Checks whether the index can resolve `criteria`, without reading data
    pub fn supports(&self, criteria: &Criteria) -> LookupResult<()> {
        match criteria {
            Criteria::And(branches) => branches.iter().try_for_each(|b| self.supports(b)),
            Criteria::Or(_) => Err(CannotIndex {
                field: None,
                reason: CannotIndexReason::Disjunction,
            }),
            Criteria::Not(inner) => self.supports(inner),
            Criteria::Field(fp) => {
                let resolver = self
                    .resolver(&fp.field)
                    .ok_or_else(|| CannotIndex::on(&fp.field, CannotIndexReason::NotIndexed))?;
                supports_predicate(&fp.field, resolver, &fp.predicate)
            }
        }
    }

    /// Resolves `criteria` to the exact set of matching positions
    pub fn query(&self, criteria: &Criteria, options: LookupOptions) -> Lookup {
        let result = self
            .supports(criteria)
            .map(|()| self.resolve(criteria, options));
        match result {
            Ok(positions) => Lookup::Positions(positions),
            Err(cannot) => Lookup::CannotIndex(cannot),
        }
    }

    /// Estimated number of matching positions. None if not index-resolvable.
    ///
    /// `$or` branches are summed, so the estimate may exceed the true count.
    pub fn estimate(&self, criteria: &Criteria, options: LookupOptions) -> Option<u64> {
        let total = options.total_positions;
        match criteria {
            Criteria::And(branches) => branches
                .iter()
                .map(|b| self.estimate(b, options))
                .try_fold(total, |acc, e| e.map(|e| acc.min(e))),
            Criteria::Or(branches) => branches
                .iter()
                .map(|b| self.estimate(b, options))
                .try_fold(0u64, |acc, e| e.map(|e| acc.saturating_add(e)))
                .map(|sum| sum.min(total)),
            Criteria::Not(inner) => self
                .estimate(inner, options)
                .map(|e| total.saturating_sub(e)),
            Criteria::Field(fp) => {
                let resolver = self.resolver(&fp.field)?;
                supports_predicate(&fp.field, resolver, &fp.predicate).ok()?;
                Some(self.estimate_predicate(&fp.field, resolver, &fp.predicate, options))
            }
        }
    }

    /// Returns true as soon as some position holds the values.
    ///
    /// Without `all`, any one value suffices. With `all`, every value must
    /// have postings and the intersection must be non-empty. `excludes`
    /// only apply once candidates exist. An empty value list never matches.
    pub fn exists(&self, field: &str, values: &[Value], options: &ExistsOptions) -> bool {
        let Some(resolver) = self.resolver(field) else {
            return false;
        };
        if values.is_empty() {
            return false;
        }
        let ci = options.case_insensitive;
        let excluded = |p: &Position| options.excludes.contains(p);

        if !options.all {
            for value in values {
                for list in self.eq_lists(field, resolver, value, ci) {
                    if options.excludes.is_empty() {
                        if !list.is_empty() {
                            return true;
                        }
                    } else if list.iter().any(|p| !excluded(&p)) {
                        return true;
                    }
                }
            }
            return false;
        }

        let mut per_value = Vec::with_capacity(values.len());
        for value in values {
            let lists = self.eq_lists(field, resolver, value, ci);
            if lists.iter().all(|l| l.is_empty()) {
                return false;
            }
            per_value.push(lists);
        }

        let mut candidates: Option<PositionSet> = None;
        for lists in per_value {
            candidates = Some(match candidates {
                None => union(lists),
                Some(current) => current
                    .into_iter()
                    .filter(|&p| lists.iter().any(|l| l.contains(p)))
                    .collect(),
            });
            if candidates.as_ref().is_some_and(BTreeSet::is_empty) {
                return false;
            }
        }
        candidates.is_some_and(|c| c.iter().any(|p| !excluded(p)))
    }

    fn resolve(&self, criteria: &Criteria, options: LookupOptions) -> PositionSet {
        match criteria {
            Criteria::And(branches) => {
                let mut result: Option<PositionSet> = None;
                for branch in branches {
                    let set = self.resolve(branch, options);
                    let next = match result {
                        None => set,
                        Some(acc) => intersect(acc, &set),
                    };
                    if next.is_empty() {
                        return next;
                    }
                    result = Some(next);
                }
                result.unwrap_or_else(|| universe(options.total_positions))
            }
            // rejected by supports()
            Criteria::Or(_) => PositionSet::new(),
            Criteria::Not(inner) => complement(&self.resolve(inner, options), options.total_positions),
            Criteria::Field(fp) => match self.resolver(&fp.field) {
                Some(resolver) => self.resolve_predicate(&fp.field, resolver, &fp.predicate, options),
                None => PositionSet::new(),
            },
        }
    }

    fn resolve_predicate(
        &self,
        field: &str,
        resolver: ValueResolver,
        predicate: &Predicate,
        options: LookupOptions,
    ) -> PositionSet {
        let ci = options.case_insensitive;
        let total = options.total_positions;
        match predicate {
            Predicate::Eq(v) | Predicate::Contains(v) => union(self.eq_lists(field, resolver, v, ci)),
            Predicate::In(values) => self.union_of(field, resolver, values, ci),
            Predicate::Nin(values) => complement(&self.union_of(field, resolver, values, ci), total),
            Predicate::All(values) => {
                let mut result: Option<PositionSet> = None;
                for value in values {
                    let set = union(self.eq_lists(field, resolver, value, ci));
                    let next = match result {
                        None => set,
                        Some(acc) => intersect(acc, &set),
                    };
                    if next.is_empty() {
                        return next;
                    }
                    result = Some(next);
                }
                result.unwrap_or_else(|| universe(total))
            }
            Predicate::Cmp(CmpOp::Ne, v) => {
                complement(&union(self.eq_lists(field, resolver, v, ci)), total)
            }
            Predicate::Cmp(op, v) => union(self.cmp_lists(field, *op, v)),
            Predicate::Not(inner) => {
                complement(&self.resolve_predicate(field, resolver, inner, options), total)
            }
            Predicate::Regex(_) | Predicate::Size(_) | Predicate::Exists(_) => PositionSet::new(),
        }
    }

    fn estimate_predicate(
        &self,
        field: &str,
        resolver: ValueResolver,
        predicate: &Predicate,
        options: LookupOptions,
    ) -> u64 {
        let ci = options.case_insensitive;
        let total = options.total_positions;
        let size = |lists: Vec<&PostingList>| -> u64 {
            lists.iter().map(|l| l.len()).sum::<u64>().min(total)
        };
        match predicate {
            Predicate::Eq(v) | Predicate::Contains(v) => size(self.eq_lists(field, resolver, v, ci)),
            Predicate::In(values) => values
                .iter()
                .map(|v| size(self.eq_lists(field, resolver, v, ci)))
                .sum::<u64>()
                .min(total),
            Predicate::Nin(values) => total.saturating_sub(
                values
                    .iter()
                    .map(|v| size(self.eq_lists(field, resolver, v, ci)))
                    .sum::<u64>(),
            ),
            Predicate::All(values) => values
                .iter()
                .map(|v| size(self.eq_lists(field, resolver, v, ci)))
                .min()
                .unwrap_or(total),
            Predicate::Cmp(CmpOp::Ne, v) => {
                total.saturating_sub(size(self.eq_lists(field, resolver, v, ci)))
            }
            Predicate::Cmp(op, v) => size(self.cmp_lists(field, *op, v)),
            Predicate::Not(inner) => {
                total.saturating_sub(self.estimate_predicate(field, resolver, inner, options))
            }
            Predicate::Regex(_) | Predicate::Size(_) | Predicate::Exists(_) => total,
        }
    }

    fn union_of(
        &self,
        field: &str,
        resolver: ValueResolver,
        values: &[Value],
        ci: bool,
    ) -> PositionSet {
        let mut out = PositionSet::new();
        for value in values {
            for list in self.eq_lists(field, resolver, value, ci) {
                out.extend(list.iter());
            }
        }
        out
    }

    /// Posting lists whose key equals `value`.
    ///
    /// Case-insensitive string matching scans every key of the field.
    fn eq_lists(
        &self,
        field: &str,
        resolver: ValueResolver,
        value: &Value,
        ci: bool,
    ) -> Vec<&PostingList> {
        let Some(postings) = self.field_postings(field) else {
            return Vec::new();
        };
        match value {
            Value::String(s) if ci && resolver.kind().accepts(value) => {
                let wanted = s.to_lowercase();
                postings
                    .iter()
                    .filter(|(key, _)| {
                        resolver
                            .key_text(key, &self.terms)
                            .is_some_and(|text| text.to_lowercase() == wanted)
                    })
                    .map(|(_, list)| list)
                    .collect()
            }
            _ => resolver
                .lookup_key(value, &self.terms)
                .and_then(|key| postings.get(&key))
                .into_iter()
                .collect(),
        }
    }

    /// Posting lists whose numeric key satisfies `op` against `value`
    fn cmp_lists(&self, field: &str, op: CmpOp, value: &Value) -> Vec<&PostingList> {
        let (Some(postings), Value::Number(target)) = (self.field_postings(field), value) else {
            return Vec::new();
        };
        numeric_keys(postings)
            .filter(|(n, _)| compare_numbers(n, target).is_some_and(|o| op.holds(o)))
            .map(|(_, list)| list)
            .collect()
    }
}

fn supports_predicate(
    field: &str,
    resolver: ValueResolver,
    predicate: &Predicate,
) -> LookupResult<()> {
    let kind = resolver.kind();
    let check = |value: &Value| {
        if kind.accepts(value) {
            Ok(())
        } else {
            Err(CannotIndex::on(
                field,
                CannotIndexReason::OperandType {
                    expected: kind.type_name(),
                },
            ))
        }
    };
    match predicate {
        Predicate::Eq(v) | Predicate::Contains(v) | Predicate::Cmp(CmpOp::Ne, v) => check(v),
        Predicate::In(values) | Predicate::Nin(values) | Predicate::All(values) => {
            values.iter().try_for_each(check)
        }
        Predicate::Cmp(op, v) => {
            if !kind.is_numeric() {
                return Err(CannotIndex::on(field, CannotIndexReason::Operator(op.op_name())));
            }
            check(v)
        }
        Predicate::Not(inner) => supports_predicate(field, resolver, inner),
        Predicate::Regex(_) | Predicate::Size(_) | Predicate::Exists(_) => Err(CannotIndex::on(
            field,
            CannotIndexReason::Operator(predicate.op_name()),
        )),
    }
}

fn numeric_keys(postings: &FieldPostings) -> impl Iterator<Item = (Number, &PostingList)> {
    postings
        .iter()
        .filter_map(|(key, list)| key.parse::<Number>().ok().map(|n| (n, list)))
}

fn universe(total: Position) -> PositionSet {
    (0..total).collect()
}

fn complement(set: &PositionSet, total: Position) -> PositionSet {
    (0..total).filter(|p| !set.contains(p)).collect()
}

fn intersect(acc: PositionSet, other: &PositionSet) -> PositionSet {
    acc.into_iter().filter(|p| other.contains(p)).collect()
}

fn union(lists: Vec<&PostingList>) -> PositionSet {
    lists.into_iter().flat_map(PostingList::iter).collect()
}
