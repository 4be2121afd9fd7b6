//! Query executor for running queries against a snapshot
//!
//! Matches are masked to live documents, scored, and ranked by descending
//! score. Equal scores keep commit order.

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::QueryStats;
use crate::Result;
use roaring::RoaringBitmap;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

/// Query execution result
#[derive(Debug)]
pub struct QueryResult {
    /// Ranked `(docno, score)` pairs
    pub hits: Vec<(u32, f32)>,
    /// Number of live documents matched before the limit was applied
    pub total_hits: u64,
    pub stats: QueryStats,
}

pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute a query, keeping at most `limit` hits (all when `None`)
    pub fn execute(
        query: &dyn QueryNode,
        ctx: &QueryContext,
        limit: Option<usize>,
    ) -> Result<QueryResult> {
        let start = Instant::now();

        let mut matches = query.execute(ctx)?;
        matches &= ctx.live();
        let total_hits = matches.len();

        let hits = match limit {
            Some(top_k) => Self::collect_top_k(query, ctx, &matches, top_k),
            None => Self::collect_all(query, ctx, &matches),
        };

        let stats = QueryStats {
            docs_matched: total_hits,
            execution_time_us: start.elapsed().as_micros() as u64,
        };

        tracing::trace!(
            query_type = query.query_type(),
            matched = total_hits,
            returned = hits.len(),
            "query executed"
        );

        Ok(QueryResult {
            hits,
            total_hits,
            stats,
        })
    }

    fn collect_all(
        query: &dyn QueryNode,
        ctx: &QueryContext,
        matches: &RoaringBitmap,
    ) -> Vec<(u32, f32)> {
        let mut hits: Vec<(u32, f32)> = matches
            .iter()
            .map(|docno| (docno, query.score(ctx, docno).unwrap_or(0.0)))
            .collect();
        hits.sort_by(|a, b| rank(b, a));
        hits
    }

    /// Bounded min-heap holding the best `top_k` hits seen so far
    fn collect_top_k(
        query: &dyn QueryNode,
        ctx: &QueryContext,
        matches: &RoaringBitmap,
        top_k: usize,
    ) -> Vec<(u32, f32)> {
        if matches.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(top_k + 1);
        for docno in matches.iter() {
            let score = query.score(ctx, docno).unwrap_or(0.0);
            heap.push(Reverse(Ranked(docno, score)));
            if heap.len() > top_k {
                heap.pop();
            }
        }

        let mut hits: Vec<(u32, f32)> = heap
            .into_iter()
            .map(|Reverse(Ranked(docno, score))| (docno, score))
            .collect();
        hits.sort_by(|a, b| rank(b, a));
        hits
    }
}

/// Ascending rank: higher score is greater, then earlier docno is greater
fn rank(a: &(u32, f32), b: &(u32, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0))
}

#[derive(Clone, Copy, Debug)]
struct Ranked(u32, f32);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank(&(self.0, self.1), &(other.0, other.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_support::notes as snapshot;
    use crate::query::nodes::{BoolQuery, TermQuery};

    #[test]
    fn test_ranks_by_score() {
        let snapshot = snapshot(&["rust", "rust rust rust", "haskell"]);
        let ctx = QueryContext::new(&snapshot);

        let result = QueryExecutor::execute(&TermQuery::new("body", "rust"), &ctx, None).unwrap();
        assert_eq!(result.total_hits, 2);
        let docs: Vec<u32> = result.hits.iter().map(|(d, _)| *d).collect();
        assert_eq!(docs, vec![1, 0]);
        assert!(result.hits[0].1 > result.hits[1].1);
    }

    #[test]
    fn test_limit_keeps_best_hits() {
        let snapshot = snapshot(&["rust", "rust rust rust", "rust"]);
        let ctx = QueryContext::new(&snapshot);

        let result =
            QueryExecutor::execute(&TermQuery::new("body", "rust"), &ctx, Some(2)).unwrap();
        assert_eq!(result.total_hits, 3);
        let docs: Vec<u32> = result.hits.iter().map(|(d, _)| *d).collect();
        assert_eq!(docs, vec![1, 0]);
    }

    #[test]
    fn test_equal_scores_keep_commit_order() {
        let snapshot = snapshot(&["rust", "rust", "rust"]);
        let ctx = QueryContext::new(&snapshot);

        let result = QueryExecutor::execute(&TermQuery::new("body", "rust"), &ctx, None).unwrap();
        let docs: Vec<u32> = result.hits.iter().map(|(d, _)| *d).collect();
        assert_eq!(docs, vec![0, 1, 2]);
    }

    #[test]
    fn test_pure_negation_is_masked_to_live_docs() {
        let snapshot = snapshot(&["rust", "haskell"]);
        let ctx = QueryContext::new(&snapshot);

        let query = BoolQuery::new().must_not(TermQuery::new("body", "rust"));
        let result = QueryExecutor::execute(&query, &ctx, None).unwrap();
        assert_eq!(result.total_hits, 1);
        assert_eq!(result.hits[0].0, 1);
    }

    #[test]
    fn test_empty_result() {
        let snapshot = snapshot(&["rust"]);
        let ctx = QueryContext::new(&snapshot);

        let result =
            QueryExecutor::execute(&TermQuery::new("body", "cobol"), &ctx, Some(10)).unwrap();
        assert_eq!(result.total_hits, 0);
        assert!(result.hits.is_empty());
    }
}
