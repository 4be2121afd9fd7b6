//! Query parsing and execution
//!
//! A query string is parsed against the schema of one record type into a
//! tree of [`QueryNode`]s, which is executed over a committed
//! [`IndexSnapshot`](crate::index::IndexSnapshot):
//! - Term, phrase, prefix and wildcard queries over analyzed text
//! - Numeric, date and boolean values matched by range
//! - Boolean composition (must, should, must_not) with boosts
//!
//! [`QueryEngine`] is the entry point callers use.

pub mod ast;
pub mod context;
pub mod engine;
pub mod executor;
pub mod nodes;
pub mod query_string;
pub mod types;

pub use ast::QueryNode;
pub use context::QueryContext;
pub use engine::QueryEngine;
pub use executor::{QueryExecutor, QueryResult};
pub use nodes::{BoolQuery, PhraseQuery, PrefixQuery, RangeQuery, TermQuery, WildcardQuery};
pub use query_string::MultiFieldParser;
pub use types::*;
