//! The filter grammar shared by lexical and vector search (§4.3): scalar
//! equality, list membership, and numeric ranges over chunk `meta` fields.

use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    Scalar(String),
    List(Vec<String>),
    Range { min: Option<f64>, max: Option<f64> },
}

impl Filter {
    /// A range with both bounds absent, or `min > max`, can never match
    /// anything and is treated as an always-false filter rather than an
    /// error (§4.3 edge cases).
    pub fn is_malformed_range(&self) -> bool {
        match self {
            Filter::Range { min: None, max: None } => true,
            Filter::Range { min: Some(lo), max: Some(hi) } => lo > hi,
            _ => false,
        }
    }
}

/// Maps a slot name surfaced by the orchestrator onto the chunk `meta` key
/// it filters on (§4.3, §4.7 slot-derived filters).
pub fn canonicalize_key(key: &str) -> &str {
    match key {
        "categoria" => "category",
        "zone" | "city" => "city",
        other => other,
    }
}

/// Appends `AND (...)` clauses for every filter onto an in-flight query,
/// reading scalar/list filters as text and ranges as numeric `meta->>key`.
pub fn apply_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    filters: &'a std::collections::HashMap<String, Filter>,
) {
    for (key, filter) in filters {
        let key = canonicalize_key(key);
        match filter {
            Filter::Scalar(value) => {
                builder.push(" AND c.meta->>");
                builder.push_bind(key);
                builder.push(" = ");
                builder.push_bind(value);
            }
            Filter::List(values) => {
                builder.push(" AND c.meta->>");
                builder.push_bind(key);
                builder.push(" = ANY(");
                builder.push_bind(values);
                builder.push(")");
            }
            Filter::Range { .. } if filter.is_malformed_range() => {
                builder.push(" AND false");
            }
            Filter::Range { min, max } => {
                if let Some(lo) = min {
                    builder.push(" AND (c.meta->>");
                    builder.push_bind(key);
                    builder.push(")::double precision >= ");
                    builder.push_bind(*lo);
                }
                if let Some(hi) = max {
                    builder.push(" AND (c.meta->>");
                    builder.push_bind(key);
                    builder.push(")::double precision <= ");
                    builder.push_bind(*hi);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_bounds_absent_is_malformed() {
        assert!(Filter::Range { min: None, max: None }.is_malformed_range());
    }

    #[test]
    fn inverted_bounds_is_malformed() {
        assert!(Filter::Range { min: Some(10.0), max: Some(5.0) }.is_malformed_range());
    }

    #[test]
    fn single_bound_is_not_malformed() {
        assert!(!Filter::Range { min: Some(5.0), max: None }.is_malformed_range());
    }

    #[test]
    fn slot_names_canonicalize() {
        assert_eq!(canonicalize_key("categoria"), "category");
        assert_eq!(canonicalize_key("zone"), "city");
        assert_eq!(canonicalize_key("operation"), "operation");
    }
}
