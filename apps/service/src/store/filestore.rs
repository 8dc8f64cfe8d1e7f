use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Generic persistence of JSON records under named collections.
///
/// Kept behind a trait so the token authority, outcome processor and API
/// operations can be exercised against an in-memory double if ever needed,
/// and so the storage backend can be swapped without touching consumers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record. Fails with `Conflict` if the id already exists.
    async fn create(&self, collection: &str, id: &str, record: Value) -> Result<()>;

    /// Read a record, `NotFound` if absent.
    async fn read(&self, collection: &str, id: &str) -> Result<Value>;

    /// Shallow-merge `partial` into an existing record.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<()>;

    /// Remove a record, `NotFound` if absent.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Ids of every record in a collection, in no guaranteed order.
    async fn list(&self, collection: &str) -> Result<Vec<String>>;
}

/// Flat-file implementation: `<base>/<collection>/<id>.json`.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open the store, creating the collection directories if needed.
    pub async fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        for collection in [super::USERS, super::TOKENS, super::CHECKS] {
            fs::create_dir_all(base_dir.join(collection)).await?;
        }
        Ok(Self { base_dir })
    }

    fn record_path(&self, collection: &str, id: &str) -> PathBuf {
        self.base_dir.join(collection).join(format!("{id}.json"))
    }

    /// Write to a temp file in the target directory, then rename over the
    /// destination so a reader never observes a partially written record.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(&self, collection: &str, id: &str, record: Value) -> Result<()> {
        let path = self.record_path(collection, id);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(Error::from_io)?;
        file.write_all(serde_json::to_string(&record)?.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Value> {
        let contents = fs::read_to_string(self.record_path(collection, id))
            .await
            .map_err(Error::from_io)?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<()> {
        let Value::Object(patch) = partial else {
            return Err(Error::Validation("update payload must be a JSON object".into()));
        };

        let mut record = self.read(collection, id).await?;
        let Value::Object(fields) = &mut record else {
            return Err(Error::Validation(format!(
                "stored record {collection}/{id} is not a JSON object"
            )));
        };
        for (key, value) in patch {
            fields.insert(key, value);
        }

        let path = self.record_path(collection, id);
        self.write_atomic(&path, serde_json::to_string(&record)?.as_bytes()).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        fs::remove_file(self.record_path(collection, id)).await.map_err(Error::from_io)
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(self.base_dir.join(collection)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}
