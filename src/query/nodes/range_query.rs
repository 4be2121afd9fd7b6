//! Range query - matches documents with field values in a range

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::RangeBounds;
use crate::Result;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

/// Query that matches documents whose Numeric or DateTime value lies within
/// bounds. Documents without a parsed value never match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    #[serde(flatten)]
    pub bounds: RangeBounds,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl RangeQuery {
    pub fn new(field: impl Into<String>, bounds: RangeBounds) -> Self {
        Self {
            field: field.into(),
            bounds,
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    fn matches(&self, ctx: &QueryContext, docno: u32) -> bool {
        ctx.value(docno, &self.field)
            .is_some_and(|value| self.bounds.contains(value.as_f64()))
    }
}

impl QueryNode for RangeQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        if self.bounds.is_empty() {
            return Ok(RoaringBitmap::new());
        }
        Ok(ctx
            .live()
            .iter()
            .filter(|&docno| self.matches(ctx, docno))
            .collect())
    }

    fn query_type(&self) -> &'static str {
        "range"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn score(&self, ctx: &QueryContext, docno: u32) -> Option<f32> {
        self.matches(ctx, docno).then_some(self.boost)
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
