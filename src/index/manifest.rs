//! Index manifest
//!
//! The manifest is the commit point. Each commit:
//! 1. Write `documents.<generation>.bin.tmp` → fsync → rename
//! 2. Write `index.manifest.tmp` → fsync → rename to `index.manifest`
//! 3. fsync the index directory, then delete older document files
//!
//! Readers load only the document file the manifest names, so a commit that
//! fails before step 2 leaves the previous generation in place.

use serde::{Deserialize, Serialize};
use std::io;

use crate::schema::SearchSchema;

/// Describes the committed state of one index directory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Manifest format version
    pub version: u32,
    /// Incremented by every non-empty commit
    pub generation: u64,
    pub doc_count: u64,
    /// Document file of this generation, relative to the index directory
    pub documents: String,
    /// Schema the index was built with
    pub schema: SearchSchema,
    /// Unix timestamp (seconds) of the commit
    pub updated_at: u64,
}

impl IndexManifest {
    pub const VERSION: u32 = 2;

    pub fn new(schema: SearchSchema, generation: u64, doc_count: u64) -> Self {
        Self {
            version: Self::VERSION,
            generation,
            doc_count,
            documents: documents_file(generation),
            schema,
            updated_at: current_timestamp(),
        }
    }

    pub fn to_json(&self) -> io::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn from_json(data: &[u8]) -> io::Result<Self> {
        let manifest: IndexManifest = serde_json::from_slice(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if manifest.version > Self::VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported manifest version {}", manifest.version),
            ));
        }
        Ok(manifest)
    }
}

/// Name of the document file written by commit `generation`
pub fn documents_file(generation: u64) -> String {
    format!("documents.{:08}.bin", generation)
}

/// Whether `name` is a committed document file of any generation
pub fn is_documents_file(name: &str) -> bool {
    name.strip_prefix("documents.")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .map_or(false, |generation| {
            !generation.is_empty() && generation.bytes().all(|b| b.is_ascii_digit())
        })
}

fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
