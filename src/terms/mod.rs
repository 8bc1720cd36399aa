//! Term dictionary for term-mapped fields
//!
//! Repeated string values of term-mapped fields are interned into small
//! integer ids. The field index stores the decimal id as the value-key
//! instead of the literal string.
//!
//! # Invariants
//!
//! - Ids are assigned sequentially starting at 1 and never reused
//! - The read path (`peek_id`) never allocates an id
//! - Only terms whose usage count is zero are ever removed
//!
//! # Concurrency
//!
//! No internal locking. Callers serialize writers externally.

mod dictionary;

pub use dictionary::{CleanupPolicy, PersistedTerms, TermDictionary, TermId};
