//! Query execution context
//!
//! Read access to one committed index snapshot plus a per-query cache of
//! clause results.

use crate::index::{Bm25Params, FieldValue, IndexSnapshot, TermPostings};
use crate::schema::{FieldKind, SearchSchema};
use crate::Result;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use std::collections::HashMap;

pub struct QueryContext<'a> {
    snapshot: &'a IndexSnapshot,
    params: Bm25Params,
    /// Clause results keyed by canonical clause text; multi-field expansion
    /// tends to repeat clauses
    cache: RwLock<HashMap<String, RoaringBitmap>>,
}

impl<'a> QueryContext<'a> {
    pub fn new(snapshot: &'a IndexSnapshot) -> Self {
        Self::with_params(snapshot, Bm25Params::default())
    }

    pub fn with_params(snapshot: &'a IndexSnapshot, params: Bm25Params) -> Self {
        Self {
            snapshot,
            params,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn snapshot(&self) -> &'a IndexSnapshot {
        self.snapshot
    }

    pub fn schema(&self) -> &'a SearchSchema {
        self.snapshot.schema()
    }

    pub fn field_kind(&self, field: &str) -> Option<&'a FieldKind> {
        self.snapshot.schema().kind(field)
    }

    pub fn total_docs(&self) -> u64 {
        self.snapshot.doc_count()
    }

    pub fn live(&self) -> &'a RoaringBitmap {
        self.snapshot.live()
    }

    pub fn postings(&self, field: &str, term: &str) -> Option<&'a TermPostings> {
        self.snapshot.postings(field, term)
    }

    pub fn terms(&self, field: &str) -> impl Iterator<Item = (&'a str, &'a TermPostings)> {
        self.snapshot.terms(field)
    }

    pub fn terms_with_prefix<'p>(
        &self,
        field: &str,
        prefix: &'p str,
    ) -> impl Iterator<Item = (&'p str, &'p TermPostings)> + 'p
    where
        'a: 'p,
    {
        self.snapshot.terms_with_prefix(field, prefix)
    }

    pub fn value(&self, docno: u32, field: &str) -> Option<FieldValue> {
        self.snapshot.value(docno, field)
    }

    /// BM25 contribution of one term's postings to a document
    pub fn bm25(&self, field: &str, postings: &TermPostings, docno: u32) -> f32 {
        self.params.score(
            postings.term_frequency(docno),
            postings.doc_frequency(),
            self.total_docs(),
            self.snapshot.field_length(docno, field),
            self.snapshot.avg_field_length(field),
        )
    }

    /// Get or compute a cached clause result
    pub fn get_or_cache<F>(&self, key: &str, compute: F) -> Result<RoaringBitmap>
    where
        F: FnOnce() -> Result<RoaringBitmap>,
    {
        if let Some(cached) = self.cache.read().get(key) {
            return Ok(cached.clone());
        }
        let result = compute()?;
        self.cache.write().insert(key.to_string(), result.clone());
        Ok(result)
    }

    /// Whether a cached clause result contains `docno`; `None` when the
    /// clause has not been executed yet
    pub fn cached_contains(&self, key: &str, docno: u32) -> Option<bool> {
        self.cache.read().get(key).map(|bitmap| bitmap.contains(docno))
    }
}
