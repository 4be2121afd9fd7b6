//! Registry of record types and their indexes
//!
//! Schemas are built eagerly at registration so a bad descriptor stops
//! startup. Index handles are opened lazily on first use, at most once per
//! type, and live for the lifetime of the registry.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{Result, SchemaError, SyncError};
use crate::index::IndexHandle;
use crate::schema::{RecordDescriptor, SchemaBuilder, SearchSchema};
use crate::tokenizer::Tokenizer;

/// A registered record type: the descriptor records are projected with and
/// the schema derived from it
#[derive(Debug)]
pub struct RegisteredType {
    pub descriptor: RecordDescriptor,
    pub schema: SearchSchema,
}

type HandleSlot = Arc<Mutex<Option<Arc<IndexHandle>>>>;

pub struct IndexRegistry {
    root: PathBuf,
    analyzer: Arc<Tokenizer>,
    types: RwLock<HashMap<String, Arc<RegisteredType>>>,
    /// One slot per type; its mutex serializes first-use initialisation
    handles: DashMap<String, HandleSlot>,
}

impl IndexRegistry {
    pub fn new(root: impl Into<PathBuf>, analyzer: Arc<Tokenizer>) -> Self {
        Self {
            root: root.into(),
            analyzer,
            types: RwLock::new(HashMap::new()),
            handles: DashMap::new(),
        }
    }

    /// Registry with every record type of the configuration registered
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let analyzer = Arc::new(Tokenizer::new(&config.analyzer));
        let registry = Self::new(&config.index_root, analyzer);
        for descriptor in &config.record_types {
            registry.register(descriptor.clone())?;
        }
        Ok(registry)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn analyzer(&self) -> &Arc<Tokenizer> {
        &self.analyzer
    }

    /// Register a record type, deriving its schema.
    ///
    /// Registering the same descriptor again is a no-op; a different
    /// descriptor under a registered name is rejected.
    pub fn register(&self, descriptor: RecordDescriptor) -> Result<()> {
        if !is_plain_dir_name(&descriptor.name) {
            return Err(SchemaError::InvalidTypeName(descriptor.name).into());
        }
        let schema = SchemaBuilder::new(&descriptor).build()?;

        let mut types = self.types.write();
        if let Some(existing) = types.get(&descriptor.name) {
            if existing.descriptor == descriptor {
                return Ok(());
            }
            return Err(SchemaError::DuplicateType(descriptor.name).into());
        }

        tracing::info!(
            record_type = %descriptor.name,
            fields = schema.len(),
            "record type registered"
        );
        types.insert(
            descriptor.name.clone(),
            Arc::new(RegisteredType { descriptor, schema }),
        );
        Ok(())
    }

    pub fn is_indexed(&self, record_type: &str) -> bool {
        self.types.read().contains_key(record_type)
    }

    /// Registered record type names, sorted
    pub fn record_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn registered(&self, record_type: &str) -> Option<Arc<RegisteredType>> {
        self.types.read().get(record_type).cloned()
    }

    pub fn schema(&self, record_type: &str) -> Option<SearchSchema> {
        self.registered(record_type).map(|t| t.schema.clone())
    }

    /// The index handle of a record type, opening it on first use
    pub fn resolve(&self, record_type: &str) -> Result<Arc<IndexHandle>> {
        let registered = self
            .registered(record_type)
            .ok_or_else(|| SyncError::UnregisteredType(record_type.to_string()))?;

        let slot = self
            .handles
            .entry(record_type.to_string())
            .or_default()
            .clone();

        let mut guard = slot.lock();
        if let Some(handle) = guard.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(IndexHandle::open(
            registered.schema.clone(),
            Arc::clone(&self.analyzer),
            self.root.join(record_type),
        )?);
        *guard = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Handles opened so far
    pub fn open_handles(&self) -> Vec<Arc<IndexHandle>> {
        self.handles
            .iter()
            .filter_map(|slot| slot.value().lock().clone())
            .collect()
    }
}

/// Record type names become directories directly under the index root
fn is_plain_dir_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !Path::new(name).has_root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::error::SearchSyncError;
    use crate::schema::ValueType;
    use std::thread;
    use tempfile::TempDir;

    fn users() -> RecordDescriptor {
        RecordDescriptor::new("users")
            .column("username", ValueType::String)
            .searchable(["username"])
    }

    fn registry(dir: &TempDir) -> IndexRegistry {
        IndexRegistry::new(
            dir.path(),
            Arc::new(Tokenizer::new(&AnalyzerConfig::default())),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.register(users()).unwrap();
        registry.register(RecordDescriptor::new("courses")).unwrap();

        assert!(registry.is_indexed("users"));
        assert!(!registry.is_indexed("orders"));
        assert_eq!(registry.record_types(), vec!["courses", "users"]);
        assert!(registry.schema("users").unwrap().has_field("username"));
    }

    #[test]
    fn test_register_twice() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.register(users()).unwrap();
        registry.register(users()).unwrap();

        let err = registry
            .register(RecordDescriptor::new("users"))
            .unwrap_err();
        assert!(matches!(
            err,
            SearchSyncError::Schema(SchemaError::DuplicateType(_))
        ));
    }

    #[test]
    fn test_register_rejects_bad_descriptor() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let err = registry
            .register(RecordDescriptor::new("users").searchable(["nickname"]))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!registry.is_indexed("users"));
    }

    #[test]
    fn test_register_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        for name in ["", ".", "..", "../escape", "/tmp/users", "a/b", "a\\b"] {
            let err = registry
                .register(RecordDescriptor::new(name))
                .unwrap_err();
            assert!(
                matches!(err, SearchSyncError::Schema(SchemaError::InvalidTypeName(_))),
                "{name:?}: {err}"
            );
            assert!(err.is_fatal());
        }
        assert!(registry.record_types().is_empty());
        registry.register(RecordDescriptor::new("user_profiles")).unwrap();
    }

    #[test]
    fn test_resolve_unregistered() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        assert!(matches!(
            registry.resolve("users"),
            Err(SearchSyncError::Sync(SyncError::UnregisteredType(_)))
        ));
    }

    #[test]
    fn test_resolve_is_lazy_and_shared() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.register(users()).unwrap();
        assert!(registry.open_handles().is_empty());

        let first = registry.resolve("users").unwrap();
        let second = registry.resolve("users").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.path(), dir.path().join("users"));
        assert_eq!(registry.open_handles().len(), 1);
    }

    #[test]
    fn test_concurrent_first_use_opens_once() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(registry(&dir));
        registry.register(users()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.resolve("users").unwrap())
            })
            .collect();
        let resolved: Vec<Arc<IndexHandle>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for handle in &resolved[1..] {
            assert!(Arc::ptr_eq(&resolved[0], handle));
        }
    }

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let config = SearchConfig::new(dir.path()).with_record_type(users());
        let registry = IndexRegistry::from_config(&config).unwrap();
        assert_eq!(registry.record_types(), vec!["users"]);
    }
}
