use serde::{Deserialize, Serialize};

use crate::query::Combinator;

/// A free-text query against one record type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub text: String,
    /// Fields searched by unqualified terms; `None` means every field but the
    /// Identifier
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QuerySpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: None,
            combinator: Combinator::default(),
            limit: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    /// `or_mode = true` switches to the OR combinator
    pub fn with_or_mode(self, or_mode: bool) -> Self {
        self.with_combinator(if or_mode { Combinator::Or } else { Combinator::And })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Matching record identifier with its relevance score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub identifier: String,
    pub score: f32,
}

impl SearchHit {
    pub fn new(identifier: impl Into<String>, score: f32) -> Self {
        Self {
            identifier: identifier.into(),
            score,
        }
    }
}
