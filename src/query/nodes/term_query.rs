//! Term query - exact match on a field

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::schema::FieldKind;
use crate::Result;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

/// Query that matches documents containing an exact indexed term in a field
///
/// Text terms are expected to be analyzed already. Matches on Text fields
/// are scored with BM25; Identifier and Boolean matches score their boost.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub term: String,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl TermQuery {
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn cache_key(&self) -> String {
        format!("term:{}:{}", self.field, self.term)
    }
}

impl QueryNode for TermQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        ctx.get_or_cache(&self.cache_key(), || {
            Ok(ctx
                .postings(&self.field, &self.term)
                .map(|p| p.docs.clone())
                .unwrap_or_default())
        })
    }

    fn query_type(&self) -> &'static str {
        "term"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn score(&self, ctx: &QueryContext, docno: u32) -> Option<f32> {
        let postings = ctx.postings(&self.field, &self.term)?;
        if !postings.docs.contains(docno) {
            return None;
        }
        match ctx.field_kind(&self.field) {
            Some(FieldKind::Text) => Some(ctx.bm25(&self.field, postings, docno) * self.boost),
            _ => Some(self.boost),
        }
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
