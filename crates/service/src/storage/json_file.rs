use std::{
    fmt::Display,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::storage::gateway::RecordGateway;

/// JSON file-backed record gateway.
///
/// Stores the whole collection as one JSON array. Exports go to a sibling
/// `<file>.tmp` which is synced and then renamed over the target, so readers
/// only ever see a complete array.
#[derive(Clone, Debug)]
pub struct JsonFileGateway<V> {
    file_path: PathBuf,
    seed_path: Option<PathBuf>,
    persistent: bool,
    _records: PhantomData<fn() -> V>,
}

impl<V> JsonFileGateway<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Persistent gateway writing to `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { file_path: path.into(), seed_path: None, persistent: true, _records: PhantomData }
    }

    /// Enable or disable durable exports. A disabled gateway never touches the data file.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Fixture file imported when the data file does not exist yet.
    pub fn with_seed<P: Into<PathBuf>>(mut self, seed: P) -> Self {
        self.seed_path = Some(seed.into());
        self
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "records.json".into());
        name.push(".tmp");
        self.file_path.with_file_name(name)
    }

    /// Read and parse `path`; `None` when the file does not exist.
    async fn read_records(path: &Path) -> Result<Option<Vec<V>>, ServiceError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(path, e)),
        };
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Some(Vec::new()));
        }
        let records: Vec<V> = serde_json::from_slice(&bytes).map_err(|e| storage_err(path, e))?;
        Ok(Some(records))
    }

    async fn write_atomically(&self, data: &[u8]) -> Result<(), ServiceError> {
        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).await.map_err(|e| storage_err(&tmp, e))?;
        file.write_all(data).await.map_err(|e| storage_err(&tmp, e))?;
        file.flush().await.map_err(|e| storage_err(&tmp, e))?;
        file.sync_all().await.map_err(|e| storage_err(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &self.file_path).await.map_err(|e| storage_err(&self.file_path, e))
    }
}

#[async_trait]
impl<V> RecordGateway<V> for JsonFileGateway<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn is_persistent(&self) -> bool {
        self.persistent
    }

    async fn import(&self) -> Result<Vec<V>, ServiceError> {
        if self.persistent {
            if let Some(records) = Self::read_records(&self.file_path).await? {
                debug!(path = %self.file_path.display(), count = records.len(), "imported data file");
                return Ok(records);
            }
        }
        let Some(seed) = &self.seed_path else {
            return Ok(Vec::new());
        };
        match Self::read_records(seed).await? {
            Some(records) => {
                debug!(path = %seed.display(), count = records.len(), "imported seed file");
                Ok(records)
            }
            None => {
                warn!(path = %seed.display(), "seed file not found; starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn export(&self, records: &[V]) -> Result<(), ServiceError> {
        if !self.persistent {
            return Ok(());
        }
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| storage_err(parent, e))?;
            }
        }
        let data = serde_json::to_vec_pretty(records).map_err(|e| storage_err(&self.file_path, e))?;
        if let Err(e) = self.write_atomically(&data).await {
            let _ = fs::remove_file(self.tmp_path()).await;
            return Err(e);
        }
        debug!(path = %self.file_path.display(), count = records.len(), "exported records");
        Ok(())
    }
}

fn storage_err(path: &Path, e: impl Display) -> ServiceError {
    ServiceError::Storage(format!("{}: {}", path.display(), e))
}
