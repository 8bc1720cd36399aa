//! Configuration for the indexing core
//!
//! Loaded from a single JSON document:
//!
//! ```json
//! {
//!   "index": {
//!     "id_field": "id",
//!     "fields": {
//!       "category": { "kind": "string" },
//!       "tags": { "kind": "array:string", "term_mapping": true }
//!     },
//!     "postings": { "range_threshold": 10 },
//!     "cleanup": { "min_orphan_count": 10, "orphan_ratio": 0.15 }
//!   },
//!   "planner": { "max_index_fraction": 0.5 }
//! }
//! ```
//!
//! Every section and key is optional; omitted values take their defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{FieldKind, FieldSpec, PostingConfig};
use crate::terms::CleanupPolicy;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config is not valid JSON for the expected shape
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Config parsed but violates a constraint
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "LINEINDEX_CONFIG_IO",
            ConfigError::Parse(_) => "LINEINDEX_CONFIG_PARSE",
            ConfigError::Invalid(_) => "LINEINDEX_CONFIG_INVALID",
        }
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Field index configuration
    pub index: IndexConfig,
    /// Query planner configuration
    pub planner: PlannerConfig,
}

impl StoreConfig {
    /// Loads and validates a config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parses and validates a JSON config document
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: StoreConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.index.validate()?;
        self.planner.validate()
    }
}

fn default_id_field() -> String {
    "id".to_string()
}

/// Which fields are indexed and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Indexed fields by name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
    /// Field holding the record id (used to confirm ownership on remove)
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Posting-list tuning
    #[serde(default)]
    pub postings: PostingConfig,
    /// Term dictionary orphan cleanup policy
    #[serde(default)]
    pub cleanup: CleanupPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
            id_field: default_id_field(),
            postings: PostingConfig::default(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl IndexConfig {
    /// Config with no indexed fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain indexed field
    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), FieldSpec::plain(kind));
        self
    }

    /// Adds a term-mapped indexed field
    pub fn with_term_mapped_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), FieldSpec::term_mapped(kind));
        self
    }

    /// Overrides posting-list tuning
    pub fn with_postings(mut self, postings: PostingConfig) -> Self {
        self.postings = postings;
        self
    }

    /// Overrides the record id field
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Returns true if any field uses term mapping
    pub fn has_term_mapping(&self) -> bool {
        self.fields.values().any(|s| s.term_mapping)
    }

    /// Validates field specs and posting thresholds
    pub fn validate(&self) -> ConfigResult<()> {
        if self.id_field.is_empty() {
            return Err(ConfigError::Invalid("id_field must not be empty".into()));
        }
        if self.postings.range_threshold < 2 {
            return Err(ConfigError::Invalid(
                "postings.range_threshold must be >= 2".into(),
            ));
        }
        if self.postings.compaction_factor == 0 {
            return Err(ConfigError::Invalid(
                "postings.compaction_factor must be >= 1".into(),
            ));
        }
        if self.postings.binary_search_threshold == 0 {
            return Err(ConfigError::Invalid(
                "postings.binary_search_threshold must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cleanup.orphan_ratio) {
            return Err(ConfigError::Invalid(
                "cleanup.orphan_ratio must be within [0, 1]".into(),
            ));
        }
        for (name, spec) in &self.fields {
            if name.is_empty() || name.starts_with('$') {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is not a valid field name",
                    name
                )));
            }
            if spec.term_mapping && !spec.kind.supports_term_mapping() {
                return Err(ConfigError::Invalid(format!(
                    "field '{}' of kind {} cannot use term mapping",
                    name,
                    spec.kind.type_name()
                )));
            }
        }
        Ok(())
    }
}

/// Query planner tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Streaming wins once the implied result size exceeds this fraction
    /// of all positions
    pub max_index_fraction: f64,
    /// The selectivity check is skipped below this many positions
    pub min_records_for_estimate: u64,
    /// Pre-filter on indexable conjuncts even when others are not indexable
    pub hybrid_prefilter: bool,
    /// Ask the storage collaborator to rebuild when index data is missing
    pub rebuild_on_missing: bool,
    /// Records sampled when looking for evidence of missing index data
    pub missing_data_sample: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_index_fraction: 0.5,
            min_records_for_estimate: 64,
            hybrid_prefilter: false,
            rebuild_on_missing: true,
            missing_data_sample: 32,
        }
    }
}

impl PlannerConfig {
    /// Enables the hybrid pre-filter path
    pub fn with_hybrid_prefilter(mut self, enabled: bool) -> Self {
        self.hybrid_prefilter = enabled;
        self
    }

    /// Disables the selectivity heuristic so indexable queries always use the index
    pub fn always_prefer_index(mut self) -> Self {
        self.max_index_fraction = 1.0;
        self
    }

    /// Validates ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.max_index_fraction > 0.0 && self.max_index_fraction <= 1.0) {
            return Err(ConfigError::Invalid(
                "planner.max_index_fraction must be within (0, 1]".into(),
            ));
        }
        Ok(())
    }
}
