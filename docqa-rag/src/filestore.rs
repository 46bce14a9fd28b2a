//! Persistent vector store backed by one JSON file per collection.
//!
//! [`FileVectorStore`] keeps every collection in memory and mirrors it to
//! `<root>/<name>.json` after each mutation. Files are replaced atomically
//! (write to a temporary sibling, then rename), so a crash leaves either the
//! previous or the new contents on disk. Opening a store on an existing
//! directory reattaches to the collections found there; files that cannot be
//! read back are skipped and left on disk until deleted.

use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionData, VectorStore, validate_collection_name};

/// Schema version written to, and required from, every collection file.
pub const SCHEMA_VERSION: u32 = 1;

const EXTENSION: &str = "json";

/// On-disk layout of a collection.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCollection {
    schema_version: u32,
    name: String,
    dimensions: usize,
    records: Vec<Chunk>,
}

/// A vector store that survives process restarts.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{FileVectorStore, VectorStore};
///
/// let store = FileVectorStore::open("chroma_db").await?;
/// store.create_collection("financial_db", 384).await?;
/// ```
#[derive(Debug)]
pub struct FileVectorStore {
    root: PathBuf,
    collections: RwLock<HashMap<String, CollectionData>>,
    unreadable: RwLock<BTreeSet<String>>,
}

impl FileVectorStore {
    /// Open (creating if needed) a store rooted at `root` and load every
    /// collection file in it.
    ///
    /// Files that fail to load (corrupt, truncated or written with another
    /// schema version) are skipped with a warning and reported by
    /// [`unreadable_collections`](Self::unreadable_collections).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `root` cannot be created or listed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let mut collections = HashMap::new();
        let mut unreadable = BTreeSet::new();
        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if validate_collection_name(&name).is_err() {
                warn!(path = %path.display(), "skipping file with invalid collection name");
                continue;
            }
            match load_collection(&path, &name).await {
                Ok(data) => {
                    debug!(collection = %name, records = data.chunks.len(), "loaded collection");
                    collections.insert(name, data);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable collection file");
                    unreadable.insert(name);
                }
            }
        }

        info!(
            root = %root.display(),
            collections = collections.len(),
            unreadable = unreadable.len(),
            "opened file vector store"
        );
        Ok(Self {
            root,
            collections: RwLock::new(collections),
            unreadable: RwLock::new(unreadable),
        })
    }

    /// Names of collection files that were skipped when the store was opened.
    ///
    /// They are not listed by [`VectorStore::list_collections`] and cannot be
    /// recreated until [`VectorStore::delete_collection`] removes the file.
    pub async fn unreadable_collections(&self) -> Vec<String> {
        self.unreadable.read().await.iter().cloned().collect()
    }

    /// Directory holding the collection files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{EXTENSION}"))
    }

    async fn persist(&self, name: &str, data: &CollectionData) -> Result<()> {
        let persisted = PersistedCollection {
            schema_version: SCHEMA_VERSION,
            name: name.to_string(),
            dimensions: data.dimensions,
            records: data.chunks.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&persisted)?;

        let path = self.path_for(name);
        let tmp = self.root.join(format!(".{name}.{EXTENSION}.tmp"));
        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(collection = name, records = persisted.records.len(), "persisted collection");
        Ok(())
    }
}

async fn load_collection(path: &Path, name: &str) -> Result<CollectionData> {
    let bytes = fs::read(path).await?;
    let persisted: PersistedCollection = serde_json::from_slice(&bytes)?;
    if persisted.schema_version != SCHEMA_VERSION {
        return Err(RagError::SchemaVersion {
            collection: name.to_string(),
            found: persisted.schema_version,
            supported: SCHEMA_VERSION,
        });
    }

    let mut data = CollectionData::new(persisted.dimensions);
    for chunk in persisted.records {
        data.chunks.insert(chunk.id.clone(), chunk);
    }
    Ok(data)
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        validate_collection_name(name)?;
        if self.unreadable.read().await.contains(name) {
            return Err(RagError::UnreadableCollection(name.to_string()));
        }
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            if existing.dimensions != dimensions {
                return Err(RagError::DimensionMismatch {
                    collection: name.to_string(),
                    expected: existing.dimensions,
                    actual: dimensions,
                });
            }
            return Ok(());
        }

        let data = CollectionData::new(dimensions);
        self.persist(name, &data).await?;
        collections.insert(name.to_string(), data);
        info!(collection = name, dimensions, "created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        validate_collection_name(name)?;
        let mut collections = self.collections.write().await;
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let removed_unreadable = self.unreadable.write().await.remove(name);
        if collections.remove(name).is_some() || removed_unreadable {
            info!(collection = name, "deleted collection");
        }
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn add(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;

        let planned = data.plan_add(collection, chunks)?;
        if planned.is_empty() {
            return Ok(());
        }

        // Persist a copy first so a failed write leaves memory and disk in agreement.
        let mut updated = data.clone();
        updated.insert_all(planned);
        self.persist(collection, &updated).await?;
        *data = updated;
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;

        let mut updated = data.clone();
        if updated.remove_all(ids) == 0 {
            return Ok(());
        }
        self.persist(collection, &updated).await?;
        *data = updated;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|data| data.chunks.len())
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let data = collections
            .get(collection)
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;
        Ok(data.search(embedding, top_k))
    }
}
