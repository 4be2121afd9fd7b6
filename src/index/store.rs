use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::manifest::{is_documents_file, IndexManifest};
use crate::error::{Result, SearchSyncError};
use crate::models::Document;

const MANIFEST_FILE: &str = "index.manifest";

/// Persisted state read back from an index directory
pub struct StoredIndex {
    pub manifest: IndexManifest,
    pub documents: Vec<Document>,
}

/// On-disk storage of one index: `<index_root>/<record type>`
#[derive(Clone, Debug)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True once a commit has been written here
    pub fn exists(&self) -> bool {
        self.dir.join(MANIFEST_FILE).is_file()
    }

    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Persist the live documents under the manifest's generation, then
    /// switch the manifest over to them.
    ///
    /// Until the manifest rename succeeds the previous generation stays the
    /// committed one.
    pub fn write<'a>(
        &self,
        manifest: &IndexManifest,
        documents: impl Iterator<Item = &'a Document>,
    ) -> Result<()> {
        let documents: Vec<&Document> = documents.collect();
        let bytes = bincode::serialize(&documents)?;
        self.write_atomic(&manifest.documents, &bytes)?;
        self.write_atomic(MANIFEST_FILE, &manifest.to_json()?)?;
        sync_dir(&self.dir)?;

        if let Err(e) = self.remove_stale(&manifest.documents) {
            tracing::warn!(
                path = %self.dir.display(),
                error = %e,
                "failed to remove old document files"
            );
        }
        Ok(())
    }

    pub fn read(&self) -> Result<StoredIndex> {
        let manifest = IndexManifest::from_json(&fs::read(self.dir.join(MANIFEST_FILE))?)?;
        if !is_documents_file(&manifest.documents) {
            return Err(SearchSyncError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("manifest names invalid document file '{}'", manifest.documents),
            )));
        }
        let documents: Vec<Document> =
            bincode::deserialize(&fs::read(self.dir.join(&manifest.documents))?)?;
        Ok(StoredIndex {
            manifest,
            documents,
        })
    }

    /// Document files of every generation but `current`
    pub fn stale_files(&self, current: &str) -> io::Result<Vec<PathBuf>> {
        let mut stale = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            match entry.file_name().to_str() {
                Some(name) if is_documents_file(name) && name != current => {
                    stale.push(entry.path());
                }
                _ => {}
            }
        }
        Ok(stale)
    }

    fn remove_stale(&self, current: &str) -> io::Result<()> {
        for path in self.stale_files(current)? {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let tmp = self.dir.join(format!("{}.tmp", name));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.dir.join(name))
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
