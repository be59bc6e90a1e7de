//! Write-through credential store backed by a TOML file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use hyperion_protocol::constants::DEFAULT_PORT;

use crate::StoreError;
use crate::record::ServerRecord;

/// Version tag written into every store document.
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk layout of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    node: toml::Table,
    #[serde(default)]
    servers: BTreeMap<String, ServerRecord>,
}

impl StoreDocument {
    /// Document used when the backing file cannot be loaded.
    fn empty() -> Self {
        Self {
            version: SCHEMA_VERSION,
            node: toml::Table::new(),
            servers: BTreeMap::new(),
        }
    }

    /// Fresh document with a newly generated node identity.
    fn with_new_identity() -> Self {
        let mut node = toml::Table::new();
        node.insert("id".into(), uuid::Uuid::now_v7().to_string().into());
        node.insert("created_at".into(), Utc::now().to_rfc3339().into());
        node.insert("default_port".into(), i64::from(DEFAULT_PORT).into());
        node.insert("debug".into(), false.into());
        Self {
            node,
            ..Self::empty()
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.version != SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion(self.version));
        }
        for (key, record) in &self.servers {
            record.validate(key).map_err(StoreError::Invalid)?;
        }
        Ok(())
    }
}

/// Durable mapping from hub name to [`ServerRecord`], plus node settings.
///
/// Every mutation rewrites the whole file before returning. There is no
/// cross-process locking: concurrent writers race and the last one wins.
pub struct CredentialStore {
    path: PathBuf,
    doc: RwLock<StoreDocument>,
}

impl CredentialStore {
    /// Opens the store at `path`, creating a default document if needed.
    ///
    /// A corrupt document does not fail the call; the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            doc: RwLock::new(StoreDocument::empty()),
        };
        store.initialize()?;
        store.load();
        Ok(store)
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensures the store directory and file exist.
    ///
    /// Idempotent: an existing file is left untouched.
    pub fn initialize(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if !self.path.exists() {
            let doc = StoreDocument::with_new_identity();
            write_document(&self.path, &doc)?;
            info!(path = %self.path.display(), "created new node identity");
        }
        Ok(())
    }

    /// Reads the backing file into memory.
    ///
    /// On any read, parse, or validation error the in-memory state is
    /// replaced by an empty document and the error is logged.
    pub fn load(&self) {
        let doc = match read_document(&self.path) {
            Ok(doc) => {
                debug!(
                    path = %self.path.display(),
                    servers = doc.servers.len(),
                    "loaded credential store"
                );
                doc
            }
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to load credential store, continuing with empty state"
                );
                StoreDocument::empty()
            }
        };
        *self.write() = doc;
    }

    // --- Node settings ---

    /// Reads a node setting, falling back to `default` when the key is
    /// missing or holds a value of another type.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.read()
            .node
            .get(key)
            .cloned()
            .and_then(|v| v.try_into().ok())
            .unwrap_or(default)
    }

    /// Writes a node setting and persists immediately.
    pub fn set_setting<T: Serialize>(&self, key: &str, value: T) -> Result<(), StoreError> {
        let value = toml::Value::try_from(value)?;
        let mut guard = self.write();
        let mut next = guard.clone();
        next.node.insert(key.to_string(), value);
        self.commit(&mut guard, next)
    }

    /// Returns the generated node identifier, if the identity is intact.
    pub fn node_id(&self) -> Option<String> {
        self.read()
            .node
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Returns the node's default hub port.
    pub fn default_port(&self) -> u16 {
        let port = self.get_setting("default_port", i64::from(DEFAULT_PORT));
        u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_PORT)
    }

    // --- Server records ---

    /// Inserts a new hub record.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the name is taken.
    pub fn add_server(&self, record: ServerRecord) -> Result<(), StoreError> {
        record
            .validate(&record.name)
            .map_err(StoreError::Invalid)?;

        let mut guard = self.write();
        if guard.servers.contains_key(&record.name) {
            return Err(StoreError::AlreadyExists(record.name));
        }
        let mut next = guard.clone();
        let name = record.name.clone();
        next.servers.insert(name.clone(), record);
        self.commit(&mut guard, next)?;
        info!(server = %name, "hub record added");
        Ok(())
    }

    /// Returns the record for `name`, if any.
    pub fn get_server(&self, name: &str) -> Option<ServerRecord> {
        self.read().servers.get(name).cloned()
    }

    /// Returns every record, sorted by name.
    pub fn get_all_servers(&self) -> Vec<ServerRecord> {
        self.read().servers.values().cloned().collect()
    }

    /// Returns true if a record named `name` exists.
    pub fn contains_server(&self, name: &str) -> bool {
        self.read().servers.contains_key(name)
    }

    /// Removes a record. Returns whether one existed.
    pub fn remove_server(&self, name: &str) -> Result<bool, StoreError> {
        let mut guard = self.write();
        if !guard.servers.contains_key(name) {
            return Ok(false);
        }
        let mut next = guard.clone();
        next.servers.remove(name);
        self.commit(&mut guard, next)?;
        info!(server = %name, "hub record removed");
        Ok(true)
    }

    /// Persists `next` and installs it as the in-memory state.
    ///
    /// On write failure the previous state is kept.
    fn commit(
        &self,
        guard: &mut RwLockWriteGuard<'_, StoreDocument>,
        next: StoreDocument,
    ) -> Result<(), StoreError> {
        write_document(&self.path, &next)?;
        **guard = next;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreDocument> {
        self.doc.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreDocument> {
        self.doc.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_document(path: &Path) -> Result<StoreDocument, StoreError> {
    let content = std::fs::read_to_string(path)?;
    let doc: StoreDocument = toml::from_str(&content)?;
    doc.validate()?;
    Ok(doc)
}

fn write_document(path: &Path, doc: &StoreDocument) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(doc)?;
    std::fs::write(path, content)?;

    // The file holds bearer tokens.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    debug!(path = %path.display(), servers = doc.servers.len(), "credential store saved");
    Ok(())
}
