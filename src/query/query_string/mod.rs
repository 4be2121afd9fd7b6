//! Query string parsing
//!
//! Supports syntax like:
//! - `haskell algorithm` (terms joined by the configured combinator)
//! - `title:haskell AND NOT code:cs101`
//! - `+haskell -java`, `(bob OR alice) AND active:true`
//! - `"functional programming"` phrases
//! - `code:cs1*`, `code:cs?02` prefix and wildcard terms
//! - `seats:[10 TO 50]`, `starts:{2024-01 TO *]` ranges
//! - `title:haskell^3` boosts

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token};
pub use parser::MultiFieldParser;
