//! Text analysis for Text fields
#[allow(clippy::module_inception)]
mod tokenizer;

pub use tokenizer::{resolve_language, Tokenizer};
