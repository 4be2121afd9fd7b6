pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod models;
pub mod query;
pub mod registry;
pub mod schema;
pub mod service;
pub mod sync;
pub mod tokenizer;

pub use config::{AnalyzerConfig, SearchConfig};
pub use error::{QueryError, Result, SchemaError, SearchSyncError, SyncError};
pub use index::{CommitStats, IndexHandle};
pub use metrics::SyncMetrics;
pub use models::*;
pub use query::{Combinator, QueryEngine};
pub use registry::IndexRegistry;
pub use schema::{RecordDescriptor, SchemaBuilder, SearchSchema, ValueType};
pub use service::SearchService;
pub use sync::{MutationSync, SyncReport, SyncWorker};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
