//! Prefix query - matches terms starting with a prefix
//!
//! Expanded against the sorted term dictionary of one field, so only the
//! terms sharing the prefix are visited.

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::Result;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    /// Already normalized the way indexed terms are
    pub prefix: String,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl PrefixQuery {
    pub fn new(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            prefix: prefix.into(),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn cache_key(&self) -> String {
        format!("prefix:{}:{}", self.field, self.prefix)
    }
}

impl QueryNode for PrefixQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        ctx.get_or_cache(&self.cache_key(), || {
            let mut results = RoaringBitmap::new();
            for (_, postings) in ctx.terms_with_prefix(&self.field, &self.prefix) {
                results |= &postings.docs;
            }
            Ok(results)
        })
    }

    fn query_type(&self) -> &'static str {
        "prefix"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    /// Constant score: expanded terms are not weighted individually
    fn score(&self, ctx: &QueryContext, docno: u32) -> Option<f32> {
        ctx.terms_with_prefix(&self.field, &self.prefix)
            .any(|(_, postings)| postings.docs.contains(docno))
            .then_some(self.boost)
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
