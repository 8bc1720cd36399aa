//! Query options: paging, ordering and case sensitivity

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{PlannerError, PlannerResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field to sort by
    pub field: String,
    /// Sort direction
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Parses `field`, `field:asc`, `field:desc` or `-field`
impl FromStr for SortSpec {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = match s.rsplit_once(':') {
            Some((field, "asc")) => SortSpec::asc(field),
            Some((field, "desc")) => SortSpec::desc(field),
            Some((_, other)) => {
                return Err(PlannerError::InvalidOptions(format!(
                    "unknown sort direction '{}'",
                    other
                )))
            }
            None => match s.strip_prefix('-') {
                Some(field) => SortSpec::desc(field),
                None => SortSpec::asc(s),
            },
        };
        if spec.field.is_empty() {
            return Err(PlannerError::InvalidOptions(format!(
                "sort spec '{}' has no field",
                s
            )));
        }
        Ok(spec)
    }
}

/// Options for `QueryPlanner::find`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Maximum number of records returned
    pub limit: Option<usize>,
    /// Matching records skipped before the first returned one
    pub skip: usize,
    /// Result ordering; position order when empty
    pub order_by: Vec<SortSpec>,
    /// Compare strings ignoring case for equality-style operators
    pub case_insensitive: bool,
}

impl QueryOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<SortSpec>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Upper bound on the records the caller needs, if limited
    pub fn window(&self) -> Option<usize> {
        self.limit.map(|limit| self.skip.saturating_add(limit))
    }

    /// Rejects sort specs without a field
    pub fn validate(&self) -> PlannerResult<()> {
        if let Some(spec) = self.order_by.iter().find(|s| s.field.is_empty()) {
            return Err(PlannerError::InvalidOptions(format!(
                "order_by entry {:?} has no field",
                spec
            )));
        }
        Ok(())
    }
}
