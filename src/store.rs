use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::model::WineRecord;

/// Document collection of wine records keyed by their `id`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records, newest `createdAt` first.
    async fn list(&self) -> anyhow::Result<Vec<WineRecord>>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<WineRecord>>;
    /// Inserts or fully replaces the document with `record.id`.
    async fn put(&self, record: &WineRecord) -> anyhow::Result<()>;
    /// Returns whether a document was removed.
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
}

fn sort_newest_first(records: &mut [WineRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[derive(Debug, Clone)]
pub struct LocalFsRecordStore {
    base_dir: PathBuf,
}

impl LocalFsRecordStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn records_dir(&self) -> PathBuf {
        self.base_dir.join("records")
    }

    fn record_json_path(&self, id: &str) -> anyhow::Result<PathBuf> {
        ensure_safe_id(id)?;
        Ok(self.records_dir().join(format!("{id}.json")))
    }
}

fn ensure_safe_id(id: &str) -> anyhow::Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        anyhow::bail!("invalid record id: {id:?}");
    }
    Ok(())
}

#[async_trait]
impl RecordStore for LocalFsRecordStore {
    async fn list(&self) -> anyhow::Result<Vec<WineRecord>> {
        let dir = self.records_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read records dir: {}", dir.display()));
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("read records dir entry")? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = read_json::<WineRecord>(&path)
                .await
                .with_context(|| format!("read: {}", path.display()))?
            {
                records.push(record);
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<WineRecord>> {
        let path = self.record_json_path(id)?;
        read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))
    }

    async fn put(&self, record: &WineRecord) -> anyhow::Result<()> {
        let path = self.record_json_path(&record.id)?;
        write_json_atomic(&path, record)
            .await
            .with_context(|| format!("write record {}", record.id))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let path = self.record_json_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("remove: {}", path.display())),
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, WineRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list(&self) -> anyhow::Result<Vec<WineRecord>> {
        let mut records = self.records.read().await.values().cloned().collect::<Vec<_>>();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<WineRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, record: &WineRecord) -> anyhow::Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}
