//! Content-addressed file storage (SPEC_FULL §11): one directory per
//! workspace, hash-sharded so no directory holds more entries than a
//! filesystem handles comfortably. Replaces the teacher's tagged,
//! versioned vault-style storage — ingestion here is append-only and
//! content-addressed, not user-edited.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Clone)]
pub struct ContentAddressedStore {
    base_dir: PathBuf,
}

impl ContentAddressedStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn path_for(&self, workspace_id: Uuid, sha256: &str) -> PathBuf {
        self.base_dir
            .join(workspace_id.to_string())
            .join(&sha256[..2])
            .join(&sha256[2..4])
            .join(sha256)
    }

    /// Streams `bytes` to disk, returning the storage URI (a relative path
    /// under the workspace's shard tree) and the hex SHA256 used both as
    /// the dedup key and the on-disk filename.
    pub async fn write(&self, workspace_id: Uuid, bytes: &[u8]) -> Result<(String, String)> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let sha256 = hex::encode(hasher.finalize());

        let path = self.path_for(workspace_id, &sha256);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::Io)?;
        }
        // Content-addressed: an existing file with this hash is byte-identical.
        if tokio::fs::try_exists(&path).await.map_err(Error::Io)? {
            return Ok((Self::uri(workspace_id, &sha256), sha256));
        }
        tokio::fs::write(&path, bytes).await.map_err(Error::Io)?;
        Ok((Self::uri(workspace_id, &sha256), sha256))
    }

    pub fn resolve(&self, storage_uri: &str) -> PathBuf {
        self.base_dir.join(storage_uri)
    }

    pub async fn read(&self, storage_uri: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.resolve(storage_uri)).await.map_err(Error::Io)
    }

    /// Removes the on-disk blob for a purged file. Tolerant of the file
    /// already being gone (e.g. a retried purge).
    pub async fn delete(&self, storage_uri: &str) -> Result<()> {
        match tokio::fs::remove_file(self.resolve(storage_uri)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn uri(workspace_id: Uuid, sha256: &str) -> String {
        format!("{}/{}/{}/{}", workspace_id, &sha256[..2], &sha256[2..4], sha256)
    }
}
