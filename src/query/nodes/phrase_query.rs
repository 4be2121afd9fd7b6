//! Phrase query - matches an exact sequence of analyzed terms

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::Result;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

/// Query that matches documents containing terms at fixed relative
/// positions in a Text field.
///
/// Offsets come from the analyzer, so positions of dropped stopwords are
/// kept as gaps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub field: String,
    /// `(term, offset from the first term)`
    pub terms: Vec<(String, u32)>,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl PhraseQuery {
    /// Build from analyzed `(term, position)` pairs
    pub fn new(field: impl Into<String>, positioned: Vec<(String, u32)>) -> Self {
        let base = positioned.first().map_or(0, |(_, p)| *p);
        Self {
            field: field.into(),
            terms: positioned
                .into_iter()
                .map(|(term, position)| (term, position - base))
                .collect(),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn cache_key(&self) -> String {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(term, offset)| format!("{term}@{offset}"))
            .collect();
        format!("phrase:{}:{}", self.field, parts.join(" "))
    }

    /// True when every term occurs at its offset from some start position
    fn matches_positions(&self, ctx: &QueryContext, docno: u32) -> bool {
        let Some((first, _)) = self.terms.first() else {
            return false;
        };
        let Some(starts) = ctx
            .postings(&self.field, first)
            .and_then(|p| p.positions(docno))
        else {
            return false;
        };

        starts.iter().any(|&start| {
            self.terms.iter().skip(1).all(|(term, offset)| {
                ctx.postings(&self.field, term)
                    .and_then(|p| p.positions(docno))
                    .is_some_and(|positions| positions.contains(&(start + offset)))
            })
        })
    }
}

impl QueryNode for PhraseQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        ctx.get_or_cache(&self.cache_key(), || {
            let mut candidates: Option<RoaringBitmap> = None;
            for (term, _) in &self.terms {
                let Some(postings) = ctx.postings(&self.field, term) else {
                    return Ok(RoaringBitmap::new());
                };
                candidates = Some(match candidates {
                    Some(acc) => acc & &postings.docs,
                    None => postings.docs.clone(),
                });
            }

            Ok(candidates
                .unwrap_or_default()
                .iter()
                .filter(|&docno| self.matches_positions(ctx, docno))
                .collect())
        })
    }

    fn query_type(&self) -> &'static str {
        "phrase"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn score(&self, ctx: &QueryContext, docno: u32) -> Option<f32> {
        if !self.matches_positions(ctx, docno) {
            return None;
        }
        let total: f32 = self
            .terms
            .iter()
            .filter_map(|(term, _)| ctx.postings(&self.field, term))
            .map(|postings| ctx.bm25(&self.field, postings, docno))
            .sum();
        Some(total * self.boost)
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
