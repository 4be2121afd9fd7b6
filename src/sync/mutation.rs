//! Applying primary-store changes to the indexes
//!
//! A batch is projected record by record; records that cannot be projected
//! or routed are reported and skipped. Every index the batch touches is then
//! committed exactly once, independently of the others.

use std::sync::Arc;

use super::projector::{identifier, project};
use crate::error::{Result, SearchSyncError, SyncError};
use crate::index::{CommitStats, IndexHandle, IndexWriter};
use crate::metrics::SyncMetrics;
use crate::models::{ChangeKind, CommitBatch, Document, Record};
use crate::registry::IndexRegistry;
use crate::schema::SearchSchema;

/// A record that was not applied
#[derive(Debug)]
pub struct SyncFailure {
    pub record_type: String,
    pub kind: ChangeKind,
    pub error: SearchSyncError,
}

/// An index whose commit failed; its part of the batch was discarded
#[derive(Debug)]
pub struct CommitFailure {
    pub record_type: String,
    pub error: SearchSyncError,
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Operations staged across all indexes
    pub staged: usize,
    pub failures: Vec<SyncFailure>,
    /// Committed indexes in the order the batch first touched them
    pub commits: Vec<(String, CommitStats)>,
    pub commit_failures: Vec<CommitFailure>,
    /// True when sync is disabled and the batch was ignored
    pub skipped: bool,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.commit_failures.is_empty()
    }

    /// Whether retrying the batch could succeed
    pub fn is_retriable(&self) -> bool {
        self.commit_failures.iter().any(|f| f.error.is_retriable())
    }
}

enum Action {
    Create(Document),
    Update(Document),
    Delete(String),
}

impl Action {
    fn kind(&self) -> ChangeKind {
        match self {
            Action::Create(_) => ChangeKind::Inserted,
            Action::Update(_) => ChangeKind::Updated,
            Action::Delete(_) => ChangeKind::Deleted,
        }
    }
}

fn prepare(record: &dyn Record, kind: ChangeKind, schema: &SearchSchema) -> Result<Action> {
    Ok(match kind {
        ChangeKind::Deleted => Action::Delete(identifier(record, schema)?),
        ChangeKind::Inserted => Action::Create(project(record, schema)?),
        ChangeKind::Updated => Action::Update(project(record, schema)?),
    })
}

pub struct MutationSync {
    registry: Arc<IndexRegistry>,
    enabled: bool,
    metrics: Option<Arc<SyncMetrics>>,
}

impl MutationSync {
    pub fn new(registry: Arc<IndexRegistry>) -> Self {
        Self {
            registry,
            enabled: true,
            metrics: None,
        }
    }

    /// When disabled every entry point returns without touching an index
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Apply every change of a primary-store commit
    pub fn apply_batch(&self, batch: &CommitBatch) -> SyncReport {
        let mut report = SyncReport::default();
        if !self.enabled {
            report.skipped = true;
            return report;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_batch(batch.len());
        }

        let mut touched: Vec<(Arc<IndexHandle>, Vec<Action>)> = Vec::new();
        for change in batch.iter() {
            let prepared = self.registry.resolve(change.record_type()).and_then(|handle| {
                let action = prepare(change.record.as_ref(), change.kind, handle.schema())?;
                Ok((handle, action))
            });

            match prepared {
                Ok((handle, action)) => {
                    match touched.iter_mut().find(|(h, _)| Arc::ptr_eq(h, &handle)) {
                        Some((_, actions)) => actions.push(action),
                        None => touched.push((handle, vec![action])),
                    }
                }
                Err(error) => {
                    self.fail(&mut report, change.record_type(), change.kind, error);
                }
            }
        }

        for (handle, actions) in touched {
            let mut writer = handle.writer();
            for action in actions {
                let kind = action.kind();
                match self.stage(&mut writer, handle.record_type(), action) {
                    Ok(()) => report.staged += 1,
                    Err(error) => self.fail(&mut report, handle.record_type(), kind, error),
                }
            }

            let record_type = handle.record_type().to_string();
            match writer.commit() {
                Ok(stats) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_commit(&record_type, stats.doc_count);
                    }
                    report.commits.push((record_type, stats));
                }
                Err(error) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_commit_failure(&record_type);
                    }
                    report.commit_failures.push(CommitFailure { record_type, error });
                }
            }
        }

        tracing::debug!(
            staged = report.staged,
            failures = report.failures.len(),
            commits = report.commits.len(),
            commit_failures = report.commit_failures.len(),
            "batch applied"
        );
        report
    }

    /// Apply a single change and commit its index
    pub fn index(&self, record: &dyn Record, kind: ChangeKind) -> Result<CommitStats> {
        if !self.enabled {
            return Ok(CommitStats::default());
        }

        let handle = self.registry.resolve(record.record_type())?;
        let action = prepare(record, kind, handle.schema())?;

        let mut writer = handle.writer();
        self.stage(&mut writer, handle.record_type(), action)?;
        let result = writer.commit();
        self.observe_commit(&handle, &result);
        result
    }

    /// Replace the whole index of a record type with the given records, in
    /// one commit. Any bad record aborts the rebuild and leaves the index
    /// as it was.
    pub fn reindex<'r, I>(&self, record_type: &str, records: I) -> Result<CommitStats>
    where
        I: IntoIterator<Item = &'r dyn Record>,
    {
        if !self.enabled {
            return Ok(CommitStats::default());
        }

        let handle = self.registry.resolve(record_type)?;
        let mut writer = handle.writer();

        let staged = match self.stage_all(&mut writer, handle.schema(), records) {
            Ok(staged) => staged,
            Err(error) => {
                writer.rollback();
                tracing::warn!(record_type, error = %error, "reindex aborted");
                return Err(error);
            }
        };

        let result = writer.commit();
        self.observe_commit(&handle, &result);
        if let Ok(stats) = &result {
            tracing::info!(record_type, staged, docs = stats.doc_count, "reindex complete");
        }
        result
    }

    fn stage_all<'r, I>(
        &self,
        writer: &mut IndexWriter<'_>,
        schema: &SearchSchema,
        records: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = &'r dyn Record>,
    {
        writer.clear()?;
        let mut staged = 0;
        for record in records {
            if record.record_type() != schema.record_type {
                return Err(SyncError::WrongType {
                    expected: schema.record_type.clone(),
                    found: record.record_type().to_string(),
                }
                .into());
            }
            self.stage(writer, &schema.record_type, Action::Create(project(record, schema)?))?;
            staged += 1;
        }
        Ok(staged)
    }

    fn stage(&self, writer: &mut IndexWriter<'_>, record_type: &str, action: Action) -> Result<()> {
        match action {
            Action::Create(doc) => {
                writer.create(doc)?;
                if let Some(metrics) = &self.metrics {
                    metrics.record_create(record_type);
                }
            }
            Action::Update(doc) => {
                writer.update(doc)?;
                if let Some(metrics) = &self.metrics {
                    metrics.record_update(record_type);
                }
            }
            Action::Delete(id) => {
                writer.delete(&id)?;
                if let Some(metrics) = &self.metrics {
                    metrics.record_delete(record_type);
                }
            }
        }
        Ok(())
    }

    fn observe_commit(&self, handle: &IndexHandle, result: &Result<CommitStats>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(stats) => metrics.record_commit(handle.record_type(), stats.doc_count),
            Err(_) => metrics.record_commit_failure(handle.record_type()),
        }
    }

    fn fail(
        &self,
        report: &mut SyncReport,
        record_type: &str,
        kind: ChangeKind,
        error: SearchSyncError,
    ) {
        tracing::warn!(
            record_type,
            kind = kind.as_str(),
            error = %error,
            "record skipped"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_sync_failure();
        }
        report.failures.push(SyncFailure {
            record_type: record_type.to_string(),
            kind,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::models::JsonRecord;
    use crate::query::TermQuery;
    use crate::schema::{RecordDescriptor, ValueType};
    use crate::tokenizer::Tokenizer;
    use serde_json::json;
    use tempfile::TempDir;

    fn sync(dir: &TempDir) -> MutationSync {
        let registry = IndexRegistry::new(
            dir.path(),
            Arc::new(Tokenizer::new(&AnalyzerConfig::default())),
        );
        registry
            .register(
                RecordDescriptor::new("users")
                    .column("username", ValueType::String)
                    .searchable(["username"]),
            )
            .unwrap();
        registry
            .register(
                RecordDescriptor::new("courses")
                    .column("name", ValueType::String)
                    .searchable(["name"]),
            )
            .unwrap();
        MutationSync::new(Arc::new(registry))
    }

    fn user(id: i64, username: &str) -> JsonRecord {
        JsonRecord::from_value("users", json!({ "id": id, "username": username })).unwrap()
    }

    fn course(id: i64, name: &str) -> JsonRecord {
        JsonRecord::from_value("courses", json!({ "id": id, "name": name })).unwrap()
    }

    fn ids(sync: &MutationSync, record_type: &str, field: &str, term: &str) -> Vec<String> {
        sync.registry()
            .resolve(record_type)
            .unwrap()
            .search(&TermQuery::new(field, term), None)
            .unwrap()
            .into_iter()
            .map(|h| h.identifier)
            .collect()
    }

    #[test]
    fn test_batch_commits_each_index_once() {
        let dir = TempDir::new().unwrap();
        let sync = sync(&dir);
        let batch = CommitBatch::new()
            .inserted(user(1, "alice"))
            .inserted(course(10, "haskell"))
            .inserted(user(2, "bob"));

        let report = sync.apply_batch(&batch);
        assert!(report.is_clean());
        assert_eq!(report.staged, 3);
        let committed: Vec<&str> = report.commits.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(committed, vec!["users", "courses"]);
        assert_eq!(report.commits[0].1.generation, 1);
        assert_eq!(ids(&sync, "users", "username", "bob"), vec!["2"]);
    }

    #[test]
    fn test_bad_records_do_not_block_batch() {
        let dir = TempDir::new().unwrap();
        let sync = sync(&dir);
        let orphan = JsonRecord::from_value("orders", json!({ "id": 1 })).unwrap();
        let no_id = JsonRecord::from_value("users", json!({ "username": "carol" })).unwrap();
        let batch = CommitBatch::new()
            .inserted(orphan)
            .inserted(no_id)
            .inserted(user(1, "alice"));

        let report = sync.apply_batch(&batch);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0].error,
            SearchSyncError::Sync(SyncError::UnregisteredType(_))
        ));
        assert!(matches!(
            report.failures[1].error,
            SearchSyncError::Sync(SyncError::MissingIdentifier(_))
        ));
        assert_eq!(ids(&sync, "users", "id", "1"), vec!["1"]);
    }

    #[test]
    fn test_update_and_delete() {
        let dir = TempDir::new().unwrap();
        let sync = sync(&dir);
        sync.index(&user(1, "alice"), ChangeKind::Inserted).unwrap();
        sync.index(&user(1, "bob"), ChangeKind::Updated).unwrap();
        assert!(ids(&sync, "users", "username", "alic").is_empty());
        assert_eq!(ids(&sync, "users", "username", "bob"), vec!["1"]);

        let stats = sync.index(&user(1, "bob"), ChangeKind::Deleted).unwrap();
        assert_eq!(stats.doc_count, 0);
    }

    #[test]
    fn test_disabled_sync_is_noop() {
        let dir = TempDir::new().unwrap();
        let sync = sync(&dir).with_enabled(false);
        let report = sync.apply_batch(&CommitBatch::new().inserted(user(1, "alice")));
        assert!(report.skipped);
        assert!(!sync.registry().root().join("users").exists());
        assert!(!sync.index(&user(1, "alice"), ChangeKind::Inserted).unwrap().flushed);
    }

    #[test]
    fn test_reindex_replaces_everything() {
        let dir = TempDir::new().unwrap();
        let sync = sync(&dir);
        sync.index(&user(1, "alice"), ChangeKind::Inserted).unwrap();

        let fresh = [user(2, "bob"), user(3, "carol")];
        let records: Vec<&dyn Record> = fresh.iter().map(|r| r as &dyn Record).collect();
        let stats = sync.reindex("users", records).unwrap();
        assert_eq!(stats.doc_count, 2);
        assert!(ids(&sync, "users", "id", "1").is_empty());
    }

    #[test]
    fn test_reindex_aborts_on_bad_record() {
        let dir = TempDir::new().unwrap();
        let sync = sync(&dir);
        sync.index(&user(1, "alice"), ChangeKind::Inserted).unwrap();

        let mixed = [user(2, "bob"), course(3, "haskell")];
        let records: Vec<&dyn Record> = mixed.iter().map(|r| r as &dyn Record).collect();
        let err = sync.reindex("users", records).unwrap_err();
        assert!(matches!(err, SearchSyncError::Sync(SyncError::WrongType { .. })));

        let handle = sync.registry().resolve("users").unwrap();
        assert!(!handle.has_pending());
        assert_eq!(handle.doc_count(), 1);
    }

    #[test]
    fn test_metrics_are_recorded() {
        let dir = TempDir::new().unwrap();
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let sync = sync(&dir).with_metrics(Arc::clone(&metrics));
        sync.apply_batch(&CommitBatch::new().inserted(user(1, "alice")));

        assert_eq!(metrics.documents_created.with_label_values(&["users"]).get(), 1.0);
        assert_eq!(metrics.commits.with_label_values(&["users"]).get(), 1.0);
    }
}
