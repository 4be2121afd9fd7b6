pub mod change;
pub mod document;
pub mod record;
pub mod search;

pub use change::{ChangeKind, CommitBatch, RecordChange};
pub use document::Document;
pub use record::{stringify, JsonRecord, Record};
pub use search::{QuerySpec, SearchHit};
