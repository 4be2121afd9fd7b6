//! Per record type index
//!
//! - In-memory inverted index published as immutable snapshots
//! - Staged writes with single-writer commit
//! - Atomic on-disk persistence (documents + manifest)

pub mod buffer;
pub mod handle;
pub mod manifest;
pub mod snapshot;
pub mod statistics;
pub mod store;
pub mod types;

pub use buffer::{PendingOp, PendingWriter};
pub use handle::{IndexHandle, IndexWriter};
pub use manifest::IndexManifest;
pub use snapshot::{IndexSnapshot, TermPostings};
pub use statistics::Bm25Params;
pub use store::IndexStore;
pub use types::{CommitStats, DocNo, FieldValue};
