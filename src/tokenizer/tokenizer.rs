use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::AnalyzerConfig;

/// Map a configured language name to its stemming algorithm and stopword list
pub fn resolve_language(name: &str) -> Option<(Algorithm, LANGUAGE)> {
    match name.to_ascii_lowercase().as_str() {
        "english" | "en" => Some((Algorithm::English, LANGUAGE::English)),
        "french" | "fr" => Some((Algorithm::French, LANGUAGE::French)),
        "german" | "de" => Some((Algorithm::German, LANGUAGE::German)),
        "spanish" | "es" => Some((Algorithm::Spanish, LANGUAGE::Spanish)),
        _ => None,
    }
}

/// Stemming text analyzer used for every Text field of a schema
pub struct Tokenizer {
    config: AnalyzerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration.
    ///
    /// An unsupported language falls back to English.
    pub fn new(config: &AnalyzerConfig) -> Self {
        let (algorithm, language) = resolve_language(&config.language).unwrap_or_else(|| {
            tracing::warn!(language = %config.language, "unsupported analyzer language, using english");
            (Algorithm::English, LANGUAGE::English)
        });

        let stemmer = config.stem.then(|| Stemmer::create(algorithm));

        let stopwords = if config.remove_stopwords {
            get(language)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Normalize one word, or `None` when the filters drop it
    fn normalize(&self, word: &str) -> Option<String> {
        let token = if self.config.lowercase {
            word.to_lowercase()
        } else {
            word.to_string()
        };

        let len = token.chars().count();
        if len < self.config.min_token_length || len > self.config.max_token_length {
            return None;
        }
        if self.stopwords.contains(&token) {
            return None;
        }

        Some(match &self.stemmer {
            Some(stemmer) => stemmer.stem(&token).into_owned(),
            None => token,
        })
    }

    /// Tokenize and return (term, position) pairs in order.
    ///
    /// Positions count every word of the input, including the ones dropped
    /// by the stopword and length filters, so phrase gaps stay intact.
    pub fn tokenize_with_positions_ordered(&self, text: &str) -> Vec<(String, u32)> {
        text.unicode_words()
            .enumerate()
            .filter_map(|(pos, word)| self.normalize(word).map(|token| (token, pos as u32)))
            .collect()
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .filter_map(|word| self.normalize(word))
            .collect()
    }

    /// Map each term to its positions in the text
    pub fn tokenize_with_positions(&self, text: &str) -> HashMap<String, Vec<u32>> {
        let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
        for (token, pos) in self.tokenize_with_positions_ordered(text) {
            positions.entry(token).or_default().push(pos);
        }
        positions
    }

    /// Normalize a single query word without splitting it.
    ///
    /// Used for prefix and wildcard patterns, which are matched against
    /// indexed terms and must not be stemmed.
    pub fn normalize_pattern(&self, pattern: &str) -> String {
        if self.config.lowercase {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        }
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("config", &self.config)
            .field("stopwords", &self.stopwords.len())
            .finish()
    }
}
