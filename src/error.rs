use thiserror::Error;

/// Failures while deriving a search schema from a record descriptor.
///
/// These are raised at registration time and are not recoverable per request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("record type '{record_type}' has no attribute '{field}'")]
    UnknownAttribute { record_type: String, field: String },

    #[error("record type '{record_type}' has no relation '{relation}'")]
    UnknownRelation {
        record_type: String,
        relation: String,
    },

    #[error("record type '{0}' does not declare its primary key '{1}' as an attribute")]
    MissingPrimaryKey(String, String),

    #[error("record type '{0}' is already registered with a different schema")]
    DuplicateType(String),

    #[error("index on disk for '{0}' was built with a different schema")]
    Mismatch(String),

    #[error("record type name '{0}' cannot be used as an index directory")]
    InvalidTypeName(String),
}

/// Per-record failures while projecting or routing a mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("record type '{0}' has no registered search schema")]
    UnregisteredType(String),

    #[error("record of type '{0}' has no identifier value")]
    MissingIdentifier(String),

    #[error("record of type '{record_type}' is missing attribute '{attribute}'")]
    MissingAttribute {
        record_type: String,
        attribute: String,
    },

    #[error("record of type '{found}' routed to the '{expected}' index")]
    WrongType { expected: String, found: String },
}

/// Failures surfaced to the caller of a search.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("query parse error: {0}")]
    Parse(String),

    #[error("field '{field}' is not part of the '{record_type}' schema")]
    UnknownField { record_type: String, field: String },

    #[error("record type '{0}' is not indexed")]
    UnknownType(String),

    #[error("limit must be a positive integer")]
    InvalidLimit,
}

/// Main error type for searchsync operations
#[derive(Error, Debug)]
pub enum SearchSyncError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("commit failed for index '{record_type}': {reason}")]
    Commit { record_type: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for searchsync operations
pub type Result<T> = std::result::Result<T, SearchSyncError>;

impl SearchSyncError {
    /// Shorthand for a parse failure
    pub fn parse(message: impl Into<String>) -> Self {
        SearchSyncError::Query(QueryError::Parse(message.into()))
    }

    /// Schema and configuration errors must stop initialization
    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchSyncError::Schema(_) | SearchSyncError::Config(_))
    }

    /// Commit and I/O failures may succeed if the whole batch is retried
    pub fn is_retriable(&self) -> bool {
        matches!(self, SearchSyncError::Commit { .. } | SearchSyncError::Io(_))
    }
}
