//! Embedded search service
//!
//! Ties the registry, mutation sync and query engine together behind one
//! value owned by the application. The `enabled` switch of the
//! configuration turns indexing into a no-op and queries into empty results.

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::index::CommitStats;
use crate::metrics::SyncMetrics;
use crate::models::{ChangeKind, CommitBatch, QuerySpec, Record, SearchHit};
use crate::query::QueryEngine;
use crate::registry::IndexRegistry;
use crate::schema::RecordDescriptor;
use crate::sync::{MutationSync, SyncReport, SyncWorker};

pub struct SearchService {
    config: SearchConfig,
    registry: Arc<IndexRegistry>,
    sync: Arc<MutationSync>,
    engine: QueryEngine,
    metrics: Option<Arc<SyncMetrics>>,
}

impl SearchService {
    pub fn open(config: SearchConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Open a service that records into the given metrics
    pub fn open_with_metrics(config: SearchConfig, metrics: Arc<SyncMetrics>) -> Result<Self> {
        Self::build(config, Some(metrics))
    }

    fn build(config: SearchConfig, metrics: Option<Arc<SyncMetrics>>) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(IndexRegistry::from_config(&config)?);

        let mut sync = MutationSync::new(Arc::clone(&registry)).with_enabled(config.enabled);
        let mut engine = QueryEngine::new(Arc::clone(&registry)).with_enabled(config.enabled);
        if let Some(metrics) = &metrics {
            sync = sync.with_metrics(Arc::clone(metrics));
            engine = engine.with_metrics(Arc::clone(metrics));
        }

        tracing::info!(
            index_root = %config.index_root.display(),
            enabled = config.enabled,
            record_types = registry.record_types().len(),
            "search service opened"
        );
        Ok(Self {
            config,
            registry,
            sync: Arc::new(sync),
            engine,
            metrics,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> Option<&Arc<SyncMetrics>> {
        self.metrics.as_ref()
    }

    /// Register a record type after startup
    pub fn register(&self, descriptor: RecordDescriptor) -> Result<()> {
        self.registry.register(descriptor)
    }

    /// Index one changed record and commit
    pub fn index(&self, record: &dyn Record, kind: ChangeKind) -> Result<CommitStats> {
        self.sync.index(record, kind)
    }

    /// Identifiers of the records of `record_type` matching `text`
    pub fn query(
        &self,
        record_type: &str,
        text: &str,
        fields: Option<&[&str]>,
        limit: Option<usize>,
        or_mode: bool,
    ) -> Result<Vec<String>> {
        self.engine.search(record_type, text, fields, limit, or_mode)
    }

    pub fn query_hits(&self, record_type: &str, spec: &QuerySpec) -> Result<Vec<SearchHit>> {
        self.engine.search_hits(record_type, spec)
    }

    /// Apply a primary-store commit synchronously
    pub fn apply_batch(&self, batch: &CommitBatch) -> SyncReport {
        self.sync.apply_batch(batch)
    }

    pub fn reindex<'r, I>(&self, record_type: &str, records: I) -> Result<CommitStats>
    where
        I: IntoIterator<Item = &'r dyn Record>,
    {
        self.sync.reindex(record_type, records)
    }

    /// Start a background worker applying batches through this service's
    /// sync, with the configured queue capacity
    pub fn spawn_sync_worker(&self) -> Result<SyncWorker> {
        SyncWorker::spawn(Arc::clone(&self.sync), self.config.sync_queue_capacity)
    }
}
