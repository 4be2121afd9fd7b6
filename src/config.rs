use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SearchSyncError};
use crate::schema::RecordDescriptor;

/// Analyzer configuration for text fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
    pub language: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: true,
            stem: true,
            min_token_length: 2,
            max_token_length: 50,
            language: "english".to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Lowercasing only, every token kept verbatim otherwise
    pub fn plain() -> Self {
        Self {
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    64
}

/// Top-level configuration for the search layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Root directory holding one index directory per record type
    pub index_root: PathBuf,
    /// When false, mutation sync is a no-op and queries return nothing
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Default analyzer for text fields
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Bound of the background sync queue
    #[serde(default = "default_queue_capacity")]
    pub sync_queue_capacity: usize,
    /// Record types registered at startup
    #[serde(default)]
    pub record_types: Vec<RecordDescriptor>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_root: PathBuf::from("./search_index"),
            enabled: true,
            analyzer: AnalyzerConfig::default(),
            sync_queue_capacity: default_queue_capacity(),
            record_types: Vec::new(),
        }
    }
}

impl SearchConfig {
    /// Create a configuration rooted at the given directory
    pub fn new(index_root: impl Into<PathBuf>) -> Self {
        Self {
            index_root: index_root.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            SearchSyncError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: SearchConfig = serde_json::from_slice(&bytes)
            .map_err(|e| SearchSyncError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.sync_queue_capacity == 0 {
            return Err(SearchSyncError::Config(
                "sync_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.analyzer.min_token_length > self.analyzer.max_token_length {
            return Err(SearchSyncError::Config(
                "analyzer min_token_length exceeds max_token_length".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_sync_queue_capacity(mut self, capacity: usize) -> Self {
        self.sync_queue_capacity = capacity;
        self
    }

    /// Register a record type at startup
    pub fn with_record_type(mut self, descriptor: RecordDescriptor) -> Self {
        self.record_types.push(descriptor);
        self
    }

    /// Directory holding the index of one record type
    pub fn index_dir(&self, record_type: &str) -> PathBuf {
        self.index_root.join(record_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let analyzer = AnalyzerConfig::default();
        assert!(analyzer.lowercase);
        assert!(analyzer.remove_stopwords);
        assert!(analyzer.stem);

        let config = SearchConfig::default();
        assert!(config.enabled);
        assert_eq!(config.sync_queue_capacity, 64);
        assert!(config.record_types.is_empty());
    }

    #[test]
    fn test_builder_and_index_dir() {
        let config = SearchConfig::new("/tmp/idx")
            .with_enabled(false)
            .with_sync_queue_capacity(8);

        assert!(!config.enabled);
        assert_eq!(config.sync_queue_capacity, 8);
        assert_eq!(
            config.index_dir("user_profiles"),
            PathBuf::from("/tmp/idx/user_profiles")
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{ "index_root": "whoosh_index" }"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.analyzer, AnalyzerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let config = SearchConfig::default().with_sync_queue_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(SearchSyncError::Config(_))
        ));
    }
}
