use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::record::Record;

/// How a record changed in a primary-store commit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Inserted => "inserted",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// One changed record
#[derive(Clone)]
pub struct RecordChange {
    pub record: Arc<dyn Record>,
    pub kind: ChangeKind,
}

impl RecordChange {
    pub fn new(record: Arc<dyn Record>, kind: ChangeKind) -> Self {
        Self { record, kind }
    }

    pub fn record_type(&self) -> &str {
        self.record.record_type()
    }
}

impl std::fmt::Debug for RecordChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordChange")
            .field("record_type", &self.record.record_type())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Records affected by one primary-store commit
#[derive(Clone, Debug, Default)]
pub struct CommitBatch {
    pub changes: Vec<RecordChange>,
}

impl CommitBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Arc<dyn Record>, kind: ChangeKind) {
        self.changes.push(RecordChange::new(record, kind));
    }

    pub fn inserted(mut self, record: impl Record + 'static) -> Self {
        self.push(Arc::new(record), ChangeKind::Inserted);
        self
    }

    pub fn updated(mut self, record: impl Record + 'static) -> Self {
        self.push(Arc::new(record), ChangeKind::Updated);
        self
    }

    pub fn deleted(mut self, record: impl Record + 'static) -> Self {
        self.push(Arc::new(record), ChangeKind::Deleted);
        self
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordChange> {
        self.changes.iter()
    }
}

impl FromIterator<RecordChange> for CommitBatch {
    fn from_iter<I: IntoIterator<Item = RecordChange>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JsonRecord;
    use serde_json::json;

    fn user(id: u64) -> JsonRecord {
        JsonRecord::from_value("users", json!({ "id": id })).unwrap()
    }

    #[test]
    fn test_batch_builder() {
        let batch = CommitBatch::new()
            .inserted(user(1))
            .updated(user(2))
            .deleted(user(3));

        let kinds: Vec<ChangeKind> = batch.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Inserted, ChangeKind::Updated, ChangeKind::Deleted]
        );
        assert_eq!(batch.changes[0].record_type(), "users");
        assert!(format!("{:?}", batch.changes[2]).contains("Deleted"));
    }

    #[test]
    fn test_change_kind_serde() {
        assert_eq!(serde_json::to_string(&ChangeKind::Updated).unwrap(), r#""updated""#);
        let kind: ChangeKind = serde_json::from_str(r#""deleted""#).unwrap();
        assert_eq!(kind, ChangeKind::Deleted);
    }
}
