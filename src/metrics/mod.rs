use prometheus::{
    Counter, CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Prometheus metrics for index sync and search
#[derive(Clone)]
pub struct SyncMetrics {
    // Counters
    pub documents_created: CounterVec,
    pub documents_updated: CounterVec,
    pub documents_deleted: CounterVec,
    pub commits: CounterVec,
    pub commit_failures: CounterVec,
    pub sync_failures: Counter,
    pub queries: CounterVec,
    pub query_errors: Counter,

    // Gauges
    pub committed_documents: GaugeVec,

    // Histograms
    pub query_latency: HistogramVec,
    pub batch_size: Histogram,

    registry: Arc<Registry>,
}

impl SyncMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let per_type = |name: &str, help: &str| -> Result<CounterVec, prometheus::Error> {
            let counter = CounterVec::new(Opts::new(name, help), &["record_type"])?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let documents_created = per_type(
            "searchsync_documents_created_total",
            "Documents staged for creation",
        )?;
        let documents_updated = per_type(
            "searchsync_documents_updated_total",
            "Documents staged for replacement",
        )?;
        let documents_deleted = per_type(
            "searchsync_documents_deleted_total",
            "Documents staged for deletion",
        )?;
        let commits = per_type("searchsync_commits_total", "Successful index commits")?;
        let commit_failures = per_type(
            "searchsync_commit_failures_total",
            "Index commits that failed and discarded their batch",
        )?;

        let sync_failures = Counter::with_opts(Opts::new(
            "searchsync_sync_failures_total",
            "Records that could not be projected or routed",
        ))?;
        registry.register(Box::new(sync_failures.clone()))?;

        let queries = CounterVec::new(
            Opts::new("searchsync_queries_total", "Queries by combinator"),
            &["mode"],
        )?;
        registry.register(Box::new(queries.clone()))?;

        let query_errors = Counter::with_opts(Opts::new(
            "searchsync_query_errors_total",
            "Queries rejected or failed",
        ))?;
        registry.register(Box::new(query_errors.clone()))?;

        let committed_documents = GaugeVec::new(
            Opts::new(
                "searchsync_committed_documents",
                "Live documents in the last committed snapshot",
            ),
            &["record_type"],
        )?;
        registry.register(Box::new(committed_documents.clone()))?;

        let query_latency = HistogramVec::new(
            HistogramOpts::new("searchsync_query_latency_seconds", "Query latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["mode"],
        )?;
        registry.register(Box::new(query_latency.clone()))?;

        let batch_size = Histogram::with_opts(
            HistogramOpts::new("searchsync_batch_size", "Changed records per commit batch")
                .buckets(vec![1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
        )?;
        registry.register(Box::new(batch_size.clone()))?;

        Ok(Self {
            documents_created,
            documents_updated,
            documents_deleted,
            commits,
            commit_failures,
            sync_failures,
            queries,
            query_errors,
            committed_documents,
            query_latency,
            batch_size,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn record_create(&self, record_type: &str) {
        self.documents_created.with_label_values(&[record_type]).inc();
    }

    pub fn record_update(&self, record_type: &str) {
        self.documents_updated.with_label_values(&[record_type]).inc();
    }

    pub fn record_delete(&self, record_type: &str) {
        self.documents_deleted.with_label_values(&[record_type]).inc();
    }

    pub fn record_commit(&self, record_type: &str, doc_count: u64) {
        self.commits.with_label_values(&[record_type]).inc();
        self.committed_documents
            .with_label_values(&[record_type])
            .set(doc_count as f64);
    }

    pub fn record_commit_failure(&self, record_type: &str) {
        self.commit_failures.with_label_values(&[record_type]).inc();
    }

    pub fn record_sync_failure(&self) {
        self.sync_failures.inc();
    }

    pub fn record_query(&self, mode: &str, duration_secs: f64) {
        self.queries.with_label_values(&[mode]).inc();
        self.query_latency
            .with_label_values(&[mode])
            .observe(duration_secs);
    }

    pub fn record_query_error(&self) {
        self.query_errors.inc();
    }

    pub fn record_batch(&self, size: usize) {
        self.batch_size.observe(size as f64);
    }

    /// Render every metric in the text exposition format
    pub fn gather_text(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
