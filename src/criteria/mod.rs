//! Query criteria
//!
//! Caller JSON is parsed once into a tagged tree of logical combinators
//! (`$and`, `$or`, `$not`) over per-field predicates. Both the index and
//! the evaluator walk this tree; neither inspects raw JSON.

mod ast;
mod errors;
mod parser;

pub use ast::{CmpOp, Criteria, FieldPredicate, Pattern, Predicate};
pub use errors::{CriteriaError, CriteriaResult};
