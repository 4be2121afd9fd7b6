//! Wildcard query - matches terms using wildcards
//!
//! Supports:
//! - `*` - matches any sequence of characters
//! - `?` - matches any single character

use crate::error::SearchSyncError;
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::Result;
use regex::Regex;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    /// Already normalized the way indexed terms are
    pub pattern: String,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl WildcardQuery {
    pub fn new(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.into(),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn cache_key(&self) -> String {
        format!("wildcard:{}:{}", self.field, self.pattern)
    }

    /// Convert wildcard pattern to an anchored regex
    fn pattern_to_regex(&self) -> Result<Regex> {
        let mut regex_pattern = String::from("^");
        let mut literal = String::new();

        for ch in self.pattern.chars() {
            match ch {
                '*' | '?' => {
                    regex_pattern.push_str(&regex::escape(&literal));
                    literal.clear();
                    regex_pattern.push_str(if ch == '*' { ".*" } else { "." });
                }
                _ => literal.push(ch),
            }
        }
        regex_pattern.push_str(&regex::escape(&literal));
        regex_pattern.push('$');

        Regex::new(&regex_pattern)
            .map_err(|e| SearchSyncError::parse(format!("invalid wildcard pattern: {e}")))
    }

    /// Literal text before the first wildcard character
    pub fn extract_prefix(&self) -> &str {
        let end = self
            .pattern
            .find(['*', '?'])
            .unwrap_or(self.pattern.len());
        &self.pattern[..end]
    }
}

impl QueryNode for WildcardQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        ctx.get_or_cache(&self.cache_key(), || {
            let regex = self.pattern_to_regex()?;
            let mut results = RoaringBitmap::new();
            for (term, postings) in ctx.terms_with_prefix(&self.field, self.extract_prefix()) {
                if regex.is_match(term) {
                    results |= &postings.docs;
                }
            }
            Ok(results)
        })
    }

    fn query_type(&self) -> &'static str {
        "wildcard"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    /// Constant score
    fn score(&self, ctx: &QueryContext, docno: u32) -> Option<f32> {
        let matched = match ctx.cached_contains(&self.cache_key(), docno) {
            Some(matched) => matched,
            None => self.execute(ctx).ok()?.contains(docno),
        };
        matched.then_some(self.boost)
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
