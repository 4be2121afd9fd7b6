//! Staged mutations awaiting commit

use crate::models::Document;

/// One staged mutation
#[derive(Clone, Debug, PartialEq)]
pub enum PendingOp {
    Add(Document),
    /// Delete-then-add keyed on the identifier
    Replace(Document),
    Delete(String),
    /// Remove every document
    Clear,
}

/// Operations staged by the open writer of an index, in staging order
#[derive(Debug, Default)]
pub struct PendingWriter {
    ops: Vec<PendingOp>,
}

impl PendingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: PendingOp) {
        if op == PendingOp::Clear {
            // everything staged before a clear is moot
            self.ops.clear();
        }
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<PendingOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ops_keep_order() {
        let mut writer = PendingWriter::new();
        writer.push(PendingOp::Add(Document::new().with("id", "1")));
        writer.push(PendingOp::Delete("1".to_string()));
        assert_eq!(writer.len(), 2);
        assert!(matches!(writer.into_ops()[1], PendingOp::Delete(ref id) if id == "1"));
    }

    #[test]
    fn test_clear_discards_earlier_ops() {
        let mut writer = PendingWriter::new();
        writer.push(PendingOp::Add(Document::new().with("id", "1")));
        writer.push(PendingOp::Clear);
        writer.push(PendingOp::Add(Document::new().with("id", "2")));

        let ops = writer.into_ops();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], PendingOp::Clear);
    }
}
