//! Committed, immutable view of one index
//!
//! A commit clones the current snapshot, applies the staged operations to
//! the clone and publishes it; readers keep whatever snapshot they loaded.
//!
//! Replaced and deleted documents leave empty slots behind. Once more than
//! half the slots are empty the live documents are renumbered in commit
//! order, so slot count tracks the live document count.

use roaring::RoaringBitmap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::buffer::PendingOp;
use super::types::{DocNo, FieldValue};
use crate::models::Document;
use crate::schema::values::{parse_bool, parse_datetime_millis, parse_number};
use crate::schema::{FieldKind, SearchSchema};
use crate::tokenizer::Tokenizer;

/// Documents containing one term, with the term's positions per document
#[derive(Clone, Debug, Default)]
pub struct TermPostings {
    pub docs: RoaringBitmap,
    positions: HashMap<u32, Vec<u32>>,
}

impl TermPostings {
    pub fn positions(&self, docno: u32) -> Option<&[u32]> {
        self.positions.get(&docno).map(Vec::as_slice)
    }

    pub fn term_frequency(&self, docno: u32) -> u32 {
        self.positions.get(&docno).map_or(0, |p| p.len() as u32)
    }

    pub fn doc_frequency(&self) -> u64 {
        self.docs.len()
    }
}

/// Inverted index of one field
#[derive(Clone, Debug, Default)]
struct FieldPostings {
    terms: BTreeMap<String, TermPostings>,
    total_length: u64,
}

/// Slot count below which empty slots are never reclaimed
const COMPACT_MIN_SLOTS: usize = 64;

#[derive(Clone, Debug)]
struct StoredDoc {
    identifier: String,
    document: Document,
    values: HashMap<String, FieldValue>,
    lengths: HashMap<String, u32>,
    /// Distinct terms per field, for removal without scanning the vocabulary
    terms: HashMap<String, Vec<String>>,
}

/// Terms and parsed value produced by one field of one document
#[derive(Default)]
struct Analyzed {
    terms: Vec<(String, u32)>,
    value: Option<FieldValue>,
}

fn analyze_field(kind: &FieldKind, raw: &str, analyzer: &Tokenizer) -> Analyzed {
    match kind {
        FieldKind::Identifier => Analyzed {
            terms: vec![(raw.to_string(), 0)],
            value: None,
        },
        FieldKind::Text => Analyzed {
            terms: analyzer.tokenize_with_positions_ordered(raw),
            value: None,
        },
        FieldKind::Boolean => Analyzed {
            terms: parse_bool(raw)
                .map(|b| vec![(b.to_string(), 0)])
                .unwrap_or_default(),
            value: None,
        },
        FieldKind::Numeric { .. } => Analyzed {
            terms: Vec::new(),
            value: parse_number(raw).map(FieldValue::Number),
        },
        FieldKind::DateTime { .. } => Analyzed {
            terms: Vec::new(),
            value: parse_datetime_millis(raw).map(FieldValue::DateTime),
        },
    }
}

#[derive(Clone, Debug)]
pub struct IndexSnapshot {
    schema: Arc<SearchSchema>,
    docs: Vec<Option<StoredDoc>>,
    live: RoaringBitmap,
    ids: HashMap<String, DocNo>,
    fields: HashMap<String, FieldPostings>,
    generation: u64,
}

impl IndexSnapshot {
    pub fn empty(schema: Arc<SearchSchema>) -> Self {
        Self {
            schema,
            docs: Vec::new(),
            live: RoaringBitmap::new(),
            ids: HashMap::new(),
            fields: HashMap::new(),
            generation: 0,
        }
    }

    /// Rebuild a snapshot from persisted documents by re-analysis
    pub fn rebuild(
        schema: Arc<SearchSchema>,
        documents: Vec<Document>,
        generation: u64,
        analyzer: &Tokenizer,
    ) -> Self {
        let mut snapshot = Self::empty(schema);
        for document in documents {
            snapshot.add(document, analyzer);
        }
        snapshot.generation = generation;
        snapshot
    }

    pub fn schema(&self) -> &SearchSchema {
        &self.schema
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn doc_count(&self) -> u64 {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Document slots in use, live or emptied by a replace or delete
    pub fn slots(&self) -> usize {
        self.docs.len()
    }

    /// Live document numbers
    pub fn live(&self) -> &RoaringBitmap {
        &self.live
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.ids.contains_key(identifier)
    }

    pub fn docno(&self, identifier: &str) -> Option<DocNo> {
        self.ids.get(identifier).copied()
    }

    pub fn identifier(&self, docno: u32) -> Option<&str> {
        self.stored(docno).map(|d| d.identifier.as_str())
    }

    pub fn document(&self, docno: u32) -> Option<&Document> {
        self.stored(docno).map(|d| &d.document)
    }

    /// Live documents in commit order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.live.iter().filter_map(move |docno| self.document(docno))
    }

    fn stored(&self, docno: u32) -> Option<&StoredDoc> {
        self.docs.get(docno as usize).and_then(Option::as_ref)
    }

    pub fn postings(&self, field: &str, term: &str) -> Option<&TermPostings> {
        self.fields.get(field)?.terms.get(term)
    }

    /// Indexed terms of a field in lexicographic order
    pub fn terms(&self, field: &str) -> impl Iterator<Item = (&str, &TermPostings)> {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|f| f.terms.iter().map(|(t, p)| (t.as_str(), p)))
    }

    /// Indexed terms of a field starting with `prefix`
    pub fn terms_with_prefix<'a>(
        &'a self,
        field: &str,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a TermPostings)> + 'a {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(move |f| {
                f.terms
                    .range(prefix.to_string()..)
                    .take_while(move |(t, _)| t.starts_with(prefix))
                    .map(|(t, p)| (t.as_str(), p))
            })
    }

    pub fn value(&self, docno: u32, field: &str) -> Option<FieldValue> {
        self.stored(docno)?.values.get(field).copied()
    }

    pub fn field_length(&self, docno: u32, field: &str) -> u32 {
        self.stored(docno)
            .and_then(|d| d.lengths.get(field).copied())
            .unwrap_or(0)
    }

    pub fn avg_field_length(&self, field: &str) -> f32 {
        let live = self.live.len();
        if live == 0 {
            return 0.0;
        }
        let total = self.fields.get(field).map_or(0, |f| f.total_length);
        total as f32 / live as f32
    }

    pub(crate) fn apply(&mut self, op: PendingOp, analyzer: &Tokenizer) -> (usize, usize) {
        let counts = match op {
            PendingOp::Add(document) | PendingOp::Replace(document) => {
                let replaced = self.add(document, analyzer);
                (1, usize::from(replaced))
            }
            PendingOp::Delete(identifier) => (0, usize::from(self.remove(&identifier))),
            PendingOp::Clear => {
                let removed = self.live.len() as usize;
                self.clear();
                (0, removed)
            }
        };
        self.compact_if_sparse(analyzer);
        counts
    }

    /// Renumber the live documents when most slots are empty.
    /// Returns true when the snapshot was compacted.
    fn compact_if_sparse(&mut self, analyzer: &Tokenizer) -> bool {
        let slots = self.docs.len();
        let empty = slots - self.live.len() as usize;
        if slots < COMPACT_MIN_SLOTS || empty * 2 <= slots {
            return false;
        }

        let mut docs = std::mem::take(&mut self.docs);
        let documents: Vec<Document> = self
            .live
            .iter()
            .filter_map(|docno| docs.get_mut(docno as usize).and_then(Option::take))
            .map(|stored| stored.document)
            .collect();
        *self = Self::rebuild(Arc::clone(&self.schema), documents, self.generation, analyzer);
        tracing::debug!(
            record_type = %self.schema.record_type,
            reclaimed = empty,
            live = self.live.len(),
            "snapshot compacted"
        );
        true
    }

    /// Add a document, replacing any live document with the same identifier.
    /// Returns true when a document was replaced.
    fn add(&mut self, document: Document, analyzer: &Tokenizer) -> bool {
        let schema = Arc::clone(&self.schema);
        let Some(identifier) = document.get(schema.identifier_name()).map(str::to_string) else {
            return false;
        };
        let replaced = self.remove(&identifier);

        let docno = self.docs.len() as u32;
        let mut values = HashMap::new();
        let mut lengths = HashMap::new();
        let mut doc_terms = HashMap::new();

        for field in schema.fields() {
            let Some(raw) = document.get(&field.name) else {
                continue;
            };
            let analyzed = analyze_field(&field.kind, raw, analyzer);
            if let Some(value) = analyzed.value {
                values.insert(field.name.clone(), value);
            }
            if analyzed.terms.is_empty() {
                continue;
            }

            let length = analyzed.terms.len() as u32;
            let postings = self.fields.entry(field.name.clone()).or_default();
            postings.total_length += length as u64;
            lengths.insert(field.name.clone(), length);

            let mut distinct = Vec::new();
            for (term, position) in analyzed.terms {
                let entry = postings.terms.entry(term.clone()).or_default();
                if entry.docs.insert(docno) {
                    distinct.push(term);
                }
                entry.positions.entry(docno).or_default().push(position);
            }
            doc_terms.insert(field.name.clone(), distinct);
        }

        self.docs.push(Some(StoredDoc {
            identifier: identifier.clone(),
            document,
            values,
            lengths,
            terms: doc_terms,
        }));
        self.live.insert(docno);
        self.ids.insert(identifier, DocNo::new(docno));
        replaced
    }

    /// Remove the live document with this identifier, if any
    fn remove(&mut self, identifier: &str) -> bool {
        let Some(docno) = self.ids.remove(identifier) else {
            return false;
        };
        let docno = docno.as_u32();
        let Some(stored) = self.docs.get_mut(docno as usize).and_then(Option::take) else {
            return false;
        };
        self.live.remove(docno);

        for (field, terms) in &stored.terms {
            let Some(postings) = self.fields.get_mut(field) else {
                continue;
            };
            let length = stored.lengths.get(field).copied().unwrap_or(0);
            postings.total_length = postings.total_length.saturating_sub(length as u64);
            for term in terms {
                let Some(entry) = postings.terms.get_mut(term) else {
                    continue;
                };
                entry.docs.remove(docno);
                entry.positions.remove(&docno);
                if entry.docs.is_empty() {
                    postings.terms.remove(term);
                }
            }
        }
        true
    }

    fn clear(&mut self) {
        self.docs.clear();
        self.live.clear();
        self.ids.clear();
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::schema::SchemaField;

    fn schema() -> Arc<SearchSchema> {
        let mut schema = SearchSchema::with_identifier("users", "id");
        schema.push(SchemaField::new("username", FieldKind::Text));
        schema.push(SchemaField::new("karma", FieldKind::int()));
        schema.push(SchemaField::new("active", FieldKind::Boolean));
        schema.push(SchemaField::new("joined", FieldKind::datetime()));
        Arc::new(schema)
    }

    fn user(id: &str, name: &str) -> Document {
        Document::new()
            .with("id", id)
            .with("username", name)
            .with("karma", "12")
            .with("active", "yes")
            .with("joined", "2024-01-05")
    }

    #[test]
    fn test_add_indexes_by_kind() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::default());
        let mut snapshot = IndexSnapshot::empty(schema());
        snapshot.apply(PendingOp::Add(user("1", "alice")), &analyzer);

        assert_eq!(snapshot.doc_count(), 1);
        assert!(snapshot.postings("id", "1").is_some());
        assert!(snapshot.postings("username", "alic").is_some());
        assert!(snapshot.postings("active", "true").is_some());
        assert_eq!(snapshot.value(0, "karma"), Some(FieldValue::Number(12.0)));
        assert!(matches!(snapshot.value(0, "joined"), Some(FieldValue::DateTime(_))));
        assert_eq!(snapshot.field_length(0, "username"), 1);
    }

    #[test]
    fn test_identifier_stays_unique() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::default());
        let mut snapshot = IndexSnapshot::empty(schema());
        snapshot.apply(PendingOp::Add(user("1", "alice")), &analyzer);
        let (added, replaced) = snapshot.apply(PendingOp::Add(user("1", "bob")), &analyzer);

        assert_eq!((added, replaced), (1, 1));
        assert_eq!(snapshot.doc_count(), 1);
        assert!(snapshot.postings("username", "alic").is_none());
        assert!(snapshot.postings("username", "bob").is_some());
        assert_eq!(snapshot.docno("1"), Some(DocNo::new(1)));
    }

    #[test]
    fn test_delete_and_clear() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::default());
        let mut snapshot = IndexSnapshot::empty(schema());
        snapshot.apply(PendingOp::Add(user("1", "alice")), &analyzer);
        snapshot.apply(PendingOp::Add(user("2", "bob")), &analyzer);

        assert_eq!(snapshot.apply(PendingOp::Delete("1".into()), &analyzer), (0, 1));
        assert_eq!(snapshot.apply(PendingOp::Delete("1".into()), &analyzer), (0, 0));
        assert!(!snapshot.contains("1"));
        assert_eq!(snapshot.avg_field_length("username"), 1.0);

        assert_eq!(snapshot.apply(PendingOp::Clear, &analyzer), (0, 1));
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.terms("username").count(), 0);
    }

    #[test]
    fn test_repeated_replace_reclaims_slots() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::default());
        let mut snapshot = IndexSnapshot::empty(schema());
        for _ in 0..10_000 {
            snapshot.apply(PendingOp::Replace(user("1", "bob")), &analyzer);
            assert!(snapshot.slots() < COMPACT_MIN_SLOTS);
        }

        assert_eq!(snapshot.doc_count(), 1);
        let docno = snapshot.docno("1").unwrap().as_u32();
        assert!(snapshot.postings("username", "bob").unwrap().docs.contains(docno));
        assert_eq!(snapshot.postings("username", "bob").unwrap().doc_frequency(), 1);
        assert_eq!(snapshot.avg_field_length("username"), 1.0);
    }

    #[test]
    fn test_compaction_keeps_commit_order() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::default());
        let mut snapshot = IndexSnapshot::empty(schema());
        snapshot.apply(PendingOp::Add(user("a", "alice")), &analyzer);
        snapshot.apply(PendingOp::Add(user("b", "bob")), &analyzer);
        for _ in 0..200 {
            snapshot.apply(PendingOp::Replace(user("c", "carol")), &analyzer);
        }
        snapshot.apply(PendingOp::Delete("a".into()), &analyzer);

        let ids: Vec<&str> = snapshot
            .documents()
            .filter_map(|d| d.get("id"))
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(snapshot.slots() < COMPACT_MIN_SLOTS);
        assert!(snapshot.postings("username", "alic").is_none());
    }

    #[test]
    fn test_remove_only_touches_own_terms() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::plain());
        let mut snapshot = IndexSnapshot::empty(schema());
        snapshot.apply(PendingOp::Add(user("1", "shared alice")), &analyzer);
        snapshot.apply(PendingOp::Add(user("2", "shared bob")), &analyzer);
        snapshot.apply(PendingOp::Delete("1".into()), &analyzer);

        let shared = snapshot.postings("username", "shared").unwrap();
        assert_eq!(shared.doc_frequency(), 1);
        assert!(shared.positions(0).is_none());
        assert!(snapshot.postings("username", "alice").is_none());
        assert!(snapshot.postings("username", "bob").is_some());
    }

    #[test]
    fn test_prefix_terms() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::plain());
        let mut snapshot = IndexSnapshot::empty(schema());
        snapshot.apply(PendingOp::Add(user("1", "algebra algorithms biology")), &analyzer);

        let terms: Vec<&str> = snapshot
            .terms_with_prefix("username", "alg")
            .map(|(t, _)| t)
            .collect();
        assert_eq!(terms, vec!["algebra", "algorithms"]);
    }

    #[test]
    fn test_unparsable_structured_values_are_skipped() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::default());
        let mut snapshot = IndexSnapshot::empty(schema());
        let doc = Document::new()
            .with("id", "9")
            .with("karma", "")
            .with("active", "")
            .with("joined", "");
        snapshot.apply(PendingOp::Add(doc), &analyzer);

        assert_eq!(snapshot.value(0, "karma"), None);
        assert_eq!(snapshot.value(0, "joined"), None);
        assert_eq!(snapshot.terms("active").count(), 0);
        assert_eq!(snapshot.identifier(0), Some("9"));
    }

    #[test]
    fn test_rebuild_keeps_order() {
        let analyzer = Tokenizer::new(&AnalyzerConfig::default());
        let snapshot = IndexSnapshot::rebuild(
            schema(),
            vec![user("b", "bob"), user("a", "alice")],
            7,
            &analyzer,
        );
        assert_eq!(snapshot.generation(), 7);
        let ids: Vec<&str> = snapshot
            .documents()
            .filter_map(|d| d.get("id"))
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
