use std::path::{Path, PathBuf};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{store::StorageManager, types::stored_file::StoredFile},
};
use tempfile::TempDir;
use tracing::debug;

/// Turns a stored file into a readable path on the local filesystem.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn materialize(&self, file: &StoredFile) -> Result<MaterializedFile, AppError>;
}

/// A file written into its own temporary directory.
///
/// The directory and everything in it is removed when the value is dropped.
#[derive(Debug)]
pub struct MaterializedFile {
    path: PathBuf,
    _dir: TempDir,
}

impl MaterializedFile {
    /// Writes `data` to a fresh temporary directory under a sanitized `file_name`.
    pub async fn write(file_name: &str, data: &[u8]) -> Result<Self, AppError> {
        let dir = tempfile::Builder::new().prefix("context-sync-").tempdir()?;
        let path = dir.path().join(sanitize_file_name(file_name));
        tokio::fs::write(&path, data).await?;

        Ok(Self { path, _dir: dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads stored files back out of object storage.
#[derive(Clone)]
pub struct StorageFileSource {
    storage: StorageManager,
}

impl StorageFileSource {
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl FileSource for StorageFileSource {
    async fn materialize(&self, file: &StoredFile) -> Result<MaterializedFile, AppError> {
        let data = self.storage.get(&file.location).await?;
        let materialized = MaterializedFile::write(&file.file_name, &data).await?;
        debug!(
            content_hash = %file.content_hash,
            path = %materialized.path().display(),
            "materialized stored file"
        );
        Ok(materialized)
    }
}

/// Replaces anything but ASCII alphanumerics and '_' in the stem with '_'.
///
/// Keeps the temporary path inside its directory; the extension survives.
fn sanitize_file_name(file_name: &str) -> String {
    let clean = |part: &str| -> String {
        part.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let sanitized = match file_name.rfind('.') {
        Some(idx) if idx > 0 => {
            let (name, ext) = file_name.split_at(idx);
            format!("{}.{}", clean(name), clean(ext.trim_start_matches('.')))
        }
        _ => clean(file_name),
    };

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}
