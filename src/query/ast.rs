//! Query tree representation
//!
//! Every query node executes against a [`QueryContext`] to produce the set
//! of matching document numbers, and scores the documents it matches.

use crate::Result;
use roaring::RoaringBitmap;
use std::fmt::Debug;

use super::context::QueryContext;

pub trait QueryNode: Send + Sync + Debug {
    /// Matching document numbers. May include documents that are no longer
    /// live; the executor masks them out.
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap>;

    /// Query type name for debugging and logging
    fn query_type(&self) -> &'static str;

    fn boost(&self) -> f32 {
        1.0
    }

    /// Score contribution for a document, `None` when this node does not
    /// match it
    fn score(&self, ctx: &QueryContext, docno: u32) -> Option<f32>;

    fn clone_box(&self) -> Box<dyn QueryNode>;
}

impl Clone for Box<dyn QueryNode> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
