//! Boolean query - combines multiple clauses with AND, OR, NOT semantics

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::Result;
use roaring::RoaringBitmap;

/// Boolean query combining multiple clauses
///
/// - `must`: every clause must match. Contributes to score.
/// - `should`: with no `must` clause at least one must match; otherwise they
///   only add to the score.
/// - `must_not`: no clause may match. Does not contribute to score.
///
/// A query with only `must_not` clauses matches the live documents none of
/// them match.
#[derive(Clone, Debug)]
pub struct BoolQuery {
    pub must: Vec<Box<dyn QueryNode>>,
    pub should: Vec<Box<dyn QueryNode>>,
    pub must_not: Vec<Box<dyn QueryNode>>,
    pub boost: f32,
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        Self {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            boost: 1.0,
        }
    }

    pub fn must(mut self, query: impl QueryNode + 'static) -> Self {
        self.must.push(Box::new(query));
        self
    }

    pub fn should(mut self, query: impl QueryNode + 'static) -> Self {
        self.should.push(Box::new(query));
        self
    }

    pub fn must_not(mut self, query: impl QueryNode + 'static) -> Self {
        self.must_not.push(Box::new(query));
        self
    }

    pub fn must_boxed(mut self, query: Box<dyn QueryNode>) -> Self {
        self.must.push(query);
        self
    }

    pub fn should_boxed(mut self, query: Box<dyn QueryNode>) -> Self {
        self.should.push(query);
        self
    }

    pub fn must_not_boxed(mut self, query: Box<dyn QueryNode>) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    pub fn clause_count(&self) -> usize {
        self.must.len() + self.should.len() + self.must_not.len()
    }

    fn execute_must(&self, ctx: &QueryContext) -> Result<Option<RoaringBitmap>> {
        let mut result: Option<RoaringBitmap> = None;
        for clause in &self.must {
            let matches = clause.execute(ctx)?;
            let next = match result {
                Some(acc) => acc & matches,
                None => matches,
            };
            if next.is_empty() {
                return Ok(Some(next));
            }
            result = Some(next);
        }
        Ok(result)
    }

    fn execute_should(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let mut result = RoaringBitmap::new();
        for clause in &self.should {
            result |= clause.execute(ctx)?;
        }
        Ok(result)
    }
}

impl QueryNode for BoolQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let mut result = match self.execute_must(ctx)? {
            Some(must) => must,
            None if !self.should.is_empty() => self.execute_should(ctx)?,
            None if !self.must_not.is_empty() => ctx.live().clone(),
            None => return Ok(RoaringBitmap::new()),
        };

        for clause in &self.must_not {
            if result.is_empty() {
                break;
            }
            result -= clause.execute(ctx)?;
        }

        Ok(result)
    }

    fn query_type(&self) -> &'static str {
        "bool"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn score(&self, ctx: &QueryContext, docno: u32) -> Option<f32> {
        let mut total = 0.0;
        for clause in &self.must {
            total += clause.score(ctx, docno)?;
        }

        let mut matched_should = false;
        for clause in &self.should {
            if let Some(score) = clause.score(ctx, docno) {
                total += score;
                matched_should = true;
            }
        }
        if self.must.is_empty() && !self.should.is_empty() && !matched_should {
            return None;
        }

        for clause in &self.must_not {
            if clause.score(ctx, docno).is_some() {
                return None;
            }
        }

        Some(total * self.boost)
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
