//! Field index subsystem
//!
//! Posting-list index from (field, value-key) to the logical positions of
//! the records holding that value.
//!
//! # Design Principles
//!
//! - Derived state: the record store is the source of truth
//! - Incremental: add/remove/update without a full rebuild
//! - Deterministic: BTreeMap iteration order, sorted persisted positions
//!
//! # Invariants
//!
//! - A posting list holds exactly the positions whose record holds the value
//! - Values are indexed only when their JSON type matches the field kind
//! - Term-mapped keys are decimal term ids; reads never create terms
//! - Lookups are exact, so complements (`$nin`, `$ne`, `$not`) are safe
//!
//! Single writer: callers serialize access; nothing here locks.

mod errors;
mod field_type;
mod lookup;
mod manager;
mod persist;
mod posting;
mod resolver;

pub use errors::{IndexError, IndexResult};
pub(crate) use errors::json_type_name;
pub use field_type::{compare_numbers, literal_key, number_key, FieldKind, FieldSpec};
pub use lookup::{CannotIndex, CannotIndexReason, ExistsOptions, Lookup, LookupOptions, PositionSet};
pub use manager::{FieldIndex, FieldPostings, FieldStats, IndexHealth, IndexStats};
pub use persist::{IndexSnapshot, PersistedIndex};
pub use posting::{PersistedPostings, PersistedRange, PositionRange, PostingConfig, PostingList, Positions};
pub use resolver::{PlainResolver, ResolvedKey, TermMappedResolver, ValueResolver};
