//! Free-text search over one record type
//!
//! Parses the query string against the record type's schema, runs it on the
//! committed snapshot and returns identifiers in relevance order.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{QueryError, Result, SearchSyncError};
use crate::metrics::SyncMetrics;
use crate::models::{QuerySpec, SearchHit};
use crate::query::query_string::MultiFieldParser;
use crate::registry::IndexRegistry;

pub struct QueryEngine {
    registry: Arc<IndexRegistry>,
    enabled: bool,
    metrics: Option<Arc<SyncMetrics>>,
}

impl QueryEngine {
    pub fn new(registry: Arc<IndexRegistry>) -> Self {
        Self {
            registry,
            enabled: true,
            metrics: None,
        }
    }

    /// When disabled every query returns no hits
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Identifiers of the records matching `text`, best first.
    ///
    /// `fields` restricts unqualified terms to the named fields (default:
    /// every field but the identifier). `or_mode` makes any clause suffice.
    pub fn search(
        &self,
        record_type: &str,
        text: &str,
        fields: Option<&[&str]>,
        limit: Option<usize>,
        or_mode: bool,
    ) -> Result<Vec<String>> {
        let mut spec = QuerySpec::new(text).with_or_mode(or_mode);
        if let Some(fields) = fields {
            spec = spec.with_fields(fields.iter().copied());
        }
        spec.limit = limit;

        Ok(self
            .search_hits(record_type, &spec)?
            .into_iter()
            .map(|hit| hit.identifier)
            .collect())
    }

    /// Matching identifiers with their scores
    pub fn search_hits(&self, record_type: &str, spec: &QuerySpec) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let result = self.run(record_type, spec);

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.record_query(
                    spec.combinator.as_str(),
                    start.elapsed().as_secs_f64(),
                ),
                Err(_) => metrics.record_query_error(),
            }
        }
        if let Err(e) = &result {
            tracing::debug!(record_type, query = %spec.text, error = %e, "query rejected");
        }
        result
    }

    fn run(&self, record_type: &str, spec: &QuerySpec) -> Result<Vec<SearchHit>> {
        if spec.limit == Some(0) {
            return Err(QueryError::InvalidLimit.into());
        }
        let schema = self
            .registry
            .schema(record_type)
            .ok_or_else(|| QueryError::UnknownType(record_type.to_string()))?;
        if let Some(unknown) = spec
            .fields
            .iter()
            .flatten()
            .find(|field| !schema.has_field(field))
        {
            return Err(QueryError::UnknownField {
                record_type: record_type.to_string(),
                field: unknown.clone(),
            }
            .into());
        }
        if !self.enabled || spec.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let handle = self.registry.resolve(record_type).map_err(|e| match e {
            SearchSyncError::Sync(_) => QueryError::UnknownType(record_type.to_string()).into(),
            other => other,
        })?;

        let mut parser = MultiFieldParser::new(&spec.text, handle.schema(), handle.analyzer())?
            .with_combinator(spec.combinator);
        if let Some(fields) = &spec.fields {
            parser = parser.with_fields(fields.clone())?;
        }

        let Some(query) = parser.parse()? else {
            return Ok(Vec::new());
        };

        let hits = handle.search(query.as_ref(), spec.limit)?;
        tracing::debug!(
            record_type,
            query = %spec.text,
            mode = spec.combinator.as_str(),
            hits = hits.len(),
            "query executed"
        );
        Ok(hits)
    }
}

/// Fetch records by identifier, keeping the index order and skipping
/// identifiers the fetcher no longer finds.
pub fn resolve_ordered<T, F>(identifiers: &[String], mut fetch: F) -> Vec<T>
where
    F: FnMut(&str) -> Option<T>,
{
    identifiers.iter().filter_map(|id| fetch(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::models::{ChangeKind, JsonRecord};
    use crate::query::Combinator;
    use crate::schema::{RecordDescriptor, ValueType};
    use crate::sync::MutationSync;
    use crate::tokenizer::Tokenizer;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        sync: MutationSync,
        engine: QueryEngine,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let registry = IndexRegistry::new(
            dir.path(),
            Arc::new(Tokenizer::new(&AnalyzerConfig::default())),
        );
        let course = RecordDescriptor::new("courses")
            .column("name", ValueType::String)
            .column("year", ValueType::Integer);
        let user = RecordDescriptor::new("users").column("username", ValueType::String);
        registry
            .register(
                RecordDescriptor::new("enrollments")
                    .relation("user", user)
                    .relation("course", course)
                    .searchable(["user.username", "course.name", "course.year"]),
            )
            .unwrap();

        let registry = Arc::new(registry);
        Fixture {
            _dir: dir,
            sync: MutationSync::new(Arc::clone(&registry)),
            engine: QueryEngine::new(registry),
        }
    }

    fn enroll(fixture: &Fixture, id: i64, username: &str, course: &str, year: i64) {
        let record = JsonRecord::from_value(
            "enrollments",
            json!({
                "id": id,
                "user": { "id": id, "username": username },
                "course": { "id": id, "name": course, "year": year }
            }),
        )
        .unwrap();
        fixture.sync.index(&record, ChangeKind::Inserted).unwrap();
    }

    #[test]
    fn test_course_name_and_year() {
        let f = fixture();
        enroll(&f, 1, "alice", "CS101", 2024);

        assert_eq!(f.engine.search("enrollments", "cs101", None, None, false).unwrap(), vec!["1"]);
        assert!(f.engine.search("enrollments", "cs999", None, None, false).unwrap().is_empty());
        assert_eq!(
            f.engine.search("enrollments", "course.year:2024", None, None, false).unwrap(),
            vec!["1"]
        );
    }

    #[test]
    fn test_and_or_combinator() {
        let f = fixture();
        enroll(&f, 1, "alice", "cs101", 2024);

        assert!(f.engine.search("enrollments", "alice bob", None, None, false).unwrap().is_empty());
        assert_eq!(
            f.engine.search("enrollments", "alice bob", None, None, true).unwrap(),
            vec!["1"]
        );
    }

    #[test]
    fn test_field_restriction() {
        let f = fixture();
        enroll(&f, 1, "haskell", "cs101", 2024);
        enroll(&f, 2, "bob", "haskell", 2024);

        let fields: &[&str] = &["course.name"];
        assert_eq!(
            f.engine.search("enrollments", "haskell", Some(fields), None, false).unwrap(),
            vec!["2"]
        );

        let err = f
            .engine
            .search("enrollments", "haskell", Some(&["nickname"][..]), None, false)
            .unwrap_err();
        assert!(matches!(
            err,
            SearchSyncError::Query(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_blank_and_empty_queries() {
        let f = fixture();
        assert!(f.engine.search("enrollments", "cs101", None, None, false).unwrap().is_empty());

        enroll(&f, 1, "alice", "cs101", 2024);
        assert!(f.engine.search("enrollments", "   ", None, None, false).unwrap().is_empty());
        assert!(f.engine.search("enrollments", "the", None, None, false).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_field_rejected_for_blank_text() {
        let f = fixture();
        let err = f
            .engine
            .search("enrollments", "   ", Some(&["nickname"][..]), None, false)
            .unwrap_err();
        assert!(matches!(
            err,
            SearchSyncError::Query(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_rejected_queries() {
        let f = fixture();
        let err = f.engine.search("enrollments", "cs101", None, Some(0), false).unwrap_err();
        assert!(matches!(err, SearchSyncError::Query(QueryError::InvalidLimit)));

        let err = f.engine.search("orders", "cs101", None, None, false).unwrap_err();
        assert!(matches!(err, SearchSyncError::Query(QueryError::UnknownType(_))));

        let err = f.engine.search("enrollments", "*", None, None, false).unwrap_err();
        assert!(matches!(err, SearchSyncError::Query(QueryError::Parse(_))));

        let err = f.engine.search("enrollments", "(cs101", None, None, false).unwrap_err();
        assert!(matches!(err, SearchSyncError::Query(QueryError::Parse(_))));
    }

    #[test]
    fn test_limit_and_hits() {
        let f = fixture();
        for id in 1..=5 {
            enroll(&f, id, "alice", "cs101", 2024);
        }

        let ids = f.engine.search("enrollments", "alice", None, Some(2), false).unwrap();
        assert_eq!(ids, vec!["1", "2"]);

        let spec = QuerySpec::new("alice cs101").with_combinator(Combinator::Or);
        let hits = f.engine.search_hits("enrollments", &spec).unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.score > 0.0));
    }

    #[test]
    fn test_disabled_engine_returns_nothing() {
        let mut f = fixture();
        enroll(&f, 1, "alice", "cs101", 2024);
        f.engine = QueryEngine::new(Arc::clone(f.sync.registry())).with_enabled(false);
        assert!(f.engine.search("enrollments", "alice", None, None, false).unwrap().is_empty());

        let err = f
            .engine
            .search("enrollments", "alice", Some(&["nickname"][..]), None, false)
            .unwrap_err();
        assert!(matches!(
            err,
            SearchSyncError::Query(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_metrics_recorded() {
        let mut f = fixture();
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        f.engine = QueryEngine::new(Arc::clone(f.sync.registry())).with_metrics(Arc::clone(&metrics));
        f.engine.search("enrollments", "alice", None, None, true).unwrap();
        let _ = f.engine.search("enrollments", "alice", None, Some(0), false);

        assert_eq!(metrics.queries.with_label_values(&["or"]).get(), 1.0);
        assert_eq!(metrics.query_errors.get(), 1.0);
    }

    #[test]
    fn test_resolve_ordered_keeps_index_order() {
        let popularity: HashMap<&str, u32> = [("1", 5), ("3", 9)].into_iter().collect();
        let ids = vec!["3".to_string(), "2".to_string(), "1".to_string()];

        let mut records = resolve_ordered(&ids, |id| popularity.get(id).map(|p| (id.to_string(), *p)));
        assert_eq!(records, vec![("3".to_string(), 9), ("1".to_string(), 5)]);

        records.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(records[0].0, "1");
    }
}
