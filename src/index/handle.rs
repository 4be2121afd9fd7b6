//! One index per record type
//!
//! Mutations are staged through an exclusive [`IndexWriter`] and become
//! visible to readers only when committed. Readers load the committed
//! snapshot through an atomic pointer and never block on the writer.

use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard};
use std::path::Path;
use std::sync::Arc;

use super::buffer::{PendingOp, PendingWriter};
use super::manifest::IndexManifest;
use super::snapshot::IndexSnapshot;
use super::store::IndexStore;
use super::types::CommitStats;
use crate::error::{Result, SchemaError, SearchSyncError, SyncError};
use crate::models::{Document, SearchHit};
use crate::query::{QueryContext, QueryExecutor, QueryNode};
use crate::schema::SearchSchema;
use crate::tokenizer::Tokenizer;

enum WriterState {
    Closed,
    Open(PendingWriter),
}

pub struct IndexHandle {
    schema: Arc<SearchSchema>,
    analyzer: Arc<Tokenizer>,
    store: IndexStore,
    snapshot: ArcSwap<IndexSnapshot>,
    writer: Mutex<WriterState>,
}

impl IndexHandle {
    /// Open the index stored in `dir`, or start an empty one.
    ///
    /// The directory itself is created by the first mutation.
    pub fn open(
        schema: SearchSchema,
        analyzer: Arc<Tokenizer>,
        dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let schema = Arc::new(schema);
        let store = IndexStore::new(dir);

        let snapshot = if store.exists() {
            let stored = store.read()?;
            if stored.manifest.schema != *schema {
                return Err(SchemaError::Mismatch(schema.record_type.clone()).into());
            }
            if stored.manifest.doc_count != stored.documents.len() as u64 {
                tracing::warn!(
                    record_type = %schema.record_type,
                    manifest = stored.manifest.doc_count,
                    found = stored.documents.len(),
                    "document count differs from manifest"
                );
            }
            IndexSnapshot::rebuild(
                Arc::clone(&schema),
                stored.documents,
                stored.manifest.generation,
                &analyzer,
            )
        } else {
            IndexSnapshot::empty(Arc::clone(&schema))
        };

        tracing::info!(
            record_type = %schema.record_type,
            path = %store.dir().display(),
            docs = snapshot.doc_count(),
            generation = snapshot.generation(),
            "index opened"
        );

        Ok(Self {
            schema,
            analyzer,
            store,
            snapshot: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(WriterState::Closed),
        })
    }

    pub fn record_type(&self) -> &str {
        &self.schema.record_type
    }

    pub fn schema(&self) -> &SearchSchema {
        &self.schema
    }

    pub fn analyzer(&self) -> &Tokenizer {
        &self.analyzer
    }

    pub fn path(&self) -> &Path {
        self.store.dir()
    }

    /// Current committed snapshot
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.load_full()
    }

    pub fn doc_count(&self) -> u64 {
        self.snapshot.load().doc_count()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation()
    }

    /// Whether a writer currently holds staged operations
    pub fn has_pending(&self) -> bool {
        matches!(&*self.writer.lock(), WriterState::Open(p) if !p.is_empty())
    }

    /// Take the single writer of this index, blocking while another holds it
    pub fn writer(&self) -> IndexWriter<'_> {
        IndexWriter {
            handle: self,
            state: self.writer.lock(),
        }
    }

    pub fn create(&self, doc: Document) -> Result<()> {
        self.writer().create(doc)
    }

    pub fn update(&self, doc: Document) -> Result<()> {
        self.writer().update(doc)
    }

    pub fn delete(&self, identifier: &str) -> Result<()> {
        self.writer().delete(identifier)
    }

    pub fn clear(&self) -> Result<()> {
        self.writer().clear()
    }

    pub fn commit(&self) -> Result<CommitStats> {
        self.writer().commit()
    }

    /// Run a query against the committed snapshot
    pub fn search(&self, query: &dyn QueryNode, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let snapshot = self.snapshot.load_full();
        let ctx = QueryContext::new(&snapshot);
        let result = QueryExecutor::execute(query, &ctx, limit)?;
        Ok(result
            .hits
            .into_iter()
            .filter_map(|(docno, score)| {
                snapshot
                    .identifier(docno)
                    .map(|id| SearchHit::new(id, score))
            })
            .collect())
    }

    fn publish(&self, ops: Vec<PendingOp>) -> Result<CommitStats> {
        let current = self.snapshot.load_full();
        let mut next = IndexSnapshot::clone(&current);
        let (mut added, mut deleted) = (0, 0);
        for op in ops {
            let (a, d) = next.apply(op, &self.analyzer);
            added += a;
            deleted += d;
        }
        next.set_generation(current.generation() + 1);

        let manifest = IndexManifest::new(
            SearchSchema::clone(&self.schema),
            next.generation(),
            next.doc_count(),
        );
        self.store
            .write(&manifest, next.documents())
            .map_err(|e| SearchSyncError::Commit {
                record_type: self.schema.record_type.clone(),
                reason: e.to_string(),
            })?;

        let stats = CommitStats {
            generation: next.generation(),
            added,
            deleted,
            doc_count: next.doc_count(),
            flushed: true,
        };
        self.snapshot.store(Arc::new(next));
        Ok(stats)
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("record_type", &self.schema.record_type)
            .field("path", &self.store.dir())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Exclusive writer of one index.
///
/// Dropping it without committing leaves the staged operations pending for
/// the next writer.
pub struct IndexWriter<'a> {
    handle: &'a IndexHandle,
    state: MutexGuard<'a, WriterState>,
}

impl IndexWriter<'_> {
    /// Stage an add; the document must carry its identifier
    pub fn create(&mut self, doc: Document) -> Result<()> {
        let id = self.require_identifier(&doc)?;
        tracing::debug!(record_type = %self.handle.record_type(), %id, "staged create");
        self.stage(PendingOp::Add(doc))
    }

    /// Stage a replace-by-identifier
    pub fn update(&mut self, doc: Document) -> Result<()> {
        let id = self.require_identifier(&doc)?;
        tracing::debug!(record_type = %self.handle.record_type(), %id, "staged update");
        self.stage(PendingOp::Replace(doc))
    }

    pub fn delete(&mut self, identifier: &str) -> Result<()> {
        if identifier.is_empty() {
            return Err(SyncError::MissingIdentifier(self.handle.record_type().to_string()).into());
        }
        tracing::debug!(record_type = %self.handle.record_type(), id = %identifier, "staged delete");
        self.stage(PendingOp::Delete(identifier.to_string()))
    }

    /// Stage removal of every document
    pub fn clear(&mut self) -> Result<()> {
        self.stage(PendingOp::Clear)
    }

    /// Number of staged operations
    pub fn pending(&self) -> usize {
        match &*self.state {
            WriterState::Closed => 0,
            WriterState::Open(p) => p.len(),
        }
    }

    /// Publish every staged operation as one new snapshot.
    ///
    /// The writer returns to Closed whatever the outcome; on failure the
    /// staged operations are discarded and readers keep the old snapshot.
    pub fn commit(mut self) -> Result<CommitStats> {
        let handle = self.handle;
        let pending = match std::mem::replace(&mut *self.state, WriterState::Closed) {
            WriterState::Open(pending) if !pending.is_empty() => pending,
            _ => {
                return Ok(CommitStats {
                    generation: handle.generation(),
                    doc_count: handle.doc_count(),
                    ..Default::default()
                })
            }
        };

        let staged = pending.len();
        match handle.publish(pending.into_ops()) {
            Ok(stats) => {
                tracing::info!(
                    record_type = %handle.record_type(),
                    staged,
                    added = stats.added,
                    deleted = stats.deleted,
                    docs = stats.doc_count,
                    generation = stats.generation,
                    "index committed"
                );
                Ok(stats)
            }
            Err(e) => {
                tracing::warn!(
                    record_type = %handle.record_type(),
                    staged,
                    error = %e,
                    "commit failed, staged operations discarded"
                );
                Err(e)
            }
        }
    }

    /// Discard every staged operation and close the writer. Returns how many
    /// operations were dropped.
    pub fn rollback(mut self) -> usize {
        match std::mem::replace(&mut *self.state, WriterState::Closed) {
            WriterState::Open(pending) => {
                tracing::debug!(
                    record_type = %self.handle.record_type(),
                    dropped = pending.len(),
                    "staged operations rolled back"
                );
                pending.len()
            }
            WriterState::Closed => 0,
        }
    }

    fn require_identifier(&self, doc: &Document) -> Result<String> {
        match doc.get(self.handle.schema.identifier_name()) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(SyncError::MissingIdentifier(self.handle.record_type().to_string()).into()),
        }
    }

    fn stage(&mut self, op: PendingOp) -> Result<()> {
        if let WriterState::Closed = &*self.state {
            self.handle.store.ensure_dir()?;
            tracing::debug!(record_type = %self.handle.record_type(), "writer opened");
            *self.state = WriterState::Open(PendingWriter::new());
        }
        if let WriterState::Open(pending) = &mut *self.state {
            pending.push(op);
        }
        Ok(())
    }
}
