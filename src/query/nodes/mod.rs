//! Concrete query node implementations
//!
//! This module provides implementations of the `QueryNode` trait for
//! the query types the query string parser produces.

mod bool_query;
mod phrase_query;
mod prefix_query;
mod range_query;
mod term_query;
mod wildcard_query;

pub use bool_query::BoolQuery;
pub use phrase_query::PhraseQuery;
pub use prefix_query::PrefixQuery;
pub use range_query::RangeQuery;
pub use term_query::TermQuery;
pub use wildcard_query::WildcardQuery;
