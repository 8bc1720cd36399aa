//! lineindex - field indexing and query planning for an embedded document store
//!
//! Records live in an external store and are addressed by logical position.
//! This crate keeps per-field posting lists over those positions, interns
//! repeated strings, and decides per query whether to answer from the index
//! or by scanning every record.
//!
//! - `terms`: term dictionary with reference counts
//! - `index`: posting lists and the field index
//! - `criteria`: the criteria tree and its JSON parser
//! - `executor`: record-level evaluation, sorting and paging
//! - `planner`: strategy selection, `find` and `explain`
//! - `storage`: the record source contract and an in-memory source

pub mod cli;
pub mod config;
pub mod criteria;
pub mod executor;
pub mod index;
pub mod planner;
pub mod storage;
pub mod terms;
