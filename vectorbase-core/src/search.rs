//! Similarity search.
//!
//! Search is exact: every row passing the filter is scored against the query
//! and the `limit` nearest are returned, best first. Ties keep insertion
//! order. See [`distance`](crate::distance) for how each metric's distance
//! becomes a similarity.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::deleter::{resolve_conditions, ConditionError, Conditions};
use crate::distance::Metric;
use crate::engine::Engine;
use crate::error::{SearchError, StorageError};
use crate::ident::Ident;
use crate::record::Record;
use crate::storage::{Command, Nearest, SelectedRow, TableDef};

/// A nearest-neighbor query.
///
/// # Example
///
/// ```
/// use vectorbase_core::{Metric, SimilarityQuery};
///
/// let query = SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0])
///     .with_metric(Metric::L2)
///     .with_limit(5)
///     .with_filter("lang", "en");
///
/// assert_eq!(query.limit, Some(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityQuery {
    pub collection: String,
    pub vector_field: String,
    #[serde(alias = "embeddings")]
    pub query_vector: Vec<f32>,
    #[serde(default)]
    pub metric: Metric,
    /// Defaults to [`EngineConfig::default_limit`](crate::EngineConfig).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Equality pre-filter applied before ranking.
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub filter: Conditions,
}

impl SimilarityQuery {
    pub fn new(
        collection: impl Into<String>,
        vector_field: impl Into<String>,
        query_vector: Vec<f32>,
    ) -> Self {
        Self {
            collection: collection.into(),
            vector_field: vector_field.into(),
            query_vector,
            metric: Metric::default(),
            limit: None,
            filter: Conditions::new(),
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Adds an equality filter. Chainable.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: Record,
    /// Higher is more similar.
    pub similarity: f32,
}

/// Search results, best first.
pub type SearchResult = Vec<SearchHit>;

impl Engine {
    /// Returns the rows nearest to the query vector.
    #[tracing::instrument(
        skip(self, query),
        fields(collection = %query.collection, field = %query.vector_field, metric = %query.metric)
    )]
    pub fn search(&self, query: &SimilarityQuery) -> Result<SearchResult, SearchError> {
        self.check_health()?;
        let table = Ident::new(query.collection.as_str())?;
        let column = Ident::new(query.vector_field.as_str())?;

        if query.query_vector.iter().any(|x| !x.is_finite()) {
            return Err(SearchError::NonFiniteQuery);
        }
        let limit = match query.limit {
            Some(0) => return Err(SearchError::InvalidLimit),
            Some(limit) => limit.min(self.config.max_limit),
            None => self.config.default_limit,
        };

        let def = self
            .describe(&table)?
            .ok_or_else(|| SearchError::UnknownCollection(query.collection.clone()))?;

        let dimension = def
            .column(column.as_str())
            .and_then(|(_, c)| c.ty.dimension())
            .ok_or_else(|| SearchError::NotAVectorField(query.vector_field.clone()))?;
        if query.query_vector.len() != dimension {
            return Err(SearchError::DimensionMismatch {
                expected: dimension,
                got: query.query_vector.len(),
            });
        }

        let conditions = resolve_conditions(&def, &query.filter).map_err(|e| match e {
            ConditionError::UnknownField(field) => SearchError::UnknownFilterField(field),
            ConditionError::Invalid(cause) => SearchError::InvalidFilter(cause),
        })?;

        let command = Command::Select {
            table,
            conditions,
            nearest: Some(Nearest {
                column,
                metric: query.metric,
                query: query.query_vector.clone(),
            }),
            limit: Some(limit),
        };
        let rows = match self.execute_one(command) {
            Ok(outcome) => outcome.into_rows()?,
            Err(StorageError::NoSuchTable(_)) => {
                return Err(SearchError::UnknownCollection(query.collection.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let hits: SearchResult = rows
            .into_iter()
            .map(|row| {
                let similarity = query.metric.similarity(row.distance.unwrap_or(f32::INFINITY));
                SearchHit {
                    record: row_to_record(&def, row),
                    similarity,
                }
            })
            .collect();

        tracing::debug!(hits = hits.len(), limit, "search complete");
        Ok(hits)
    }
}

/// Converts a stored row back into a caller-facing record.
pub(crate) fn row_to_record(def: &TableDef, row: SelectedRow) -> Record {
    def.columns
        .iter()
        .zip(row.values)
        .map(|(column, value)| (column.name.to_string(), value.to_json()))
        .collect()
}
