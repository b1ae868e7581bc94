use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{error::AppError, storage::store::StorageManager};

/// Content-addressed handle to a file held in object storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    pub location: String,
    pub file_name: String,
    pub content_hash: String,
    pub mime_type: String,
    pub modified_at: DateTime<Utc>,
}

impl StoredFile {
    /// Writes `data` to storage under its content hash, stamped with the current time.
    ///
    /// Identical content always lands at the same location, so storing the same
    /// bytes twice under different names only refreshes the object.
    pub async fn store(
        storage: &StorageManager,
        file_name: &str,
        data: Bytes,
    ) -> Result<Self, AppError> {
        Self::store_with_modified(storage, file_name, data, Utc::now()).await
    }

    /// Like [`StoredFile::store`], keeping the source's own last-modified time.
    ///
    /// Upload cache entries are only reused while they are at least as new as
    /// `modified_at`, so re-registering an unchanged file must pass the same time.
    pub async fn store_with_modified(
        storage: &StorageManager,
        file_name: &str,
        data: Bytes,
        modified_at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        if file_name.trim().is_empty() {
            return Err(AppError::Validation("file name must not be empty".into()));
        }

        let content_hash = Self::get_sha(&data);
        let location = Self::location_for(&content_hash);
        storage.put(&location, data).await?;
        debug!(%content_hash, %file_name, %location, "stored file content");

        Ok(Self {
            location,
            file_name: file_name.to_string(),
            mime_type: Self::guess_mime_type(Path::new(file_name)),
            content_hash,
            modified_at,
        })
    }

    pub fn location_for(content_hash: &str) -> String {
        format!("files/{content_hash}")
    }

    /// Lower-cased extension of the file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.file_name)
    }

    /// Seconds since the epoch, the granularity cache entries are compared at.
    pub fn modified_timestamp(&self) -> i64 {
        self.modified_at.timestamp()
    }

    /// Guesses the MIME type based on the file extension.
    fn guess_mime_type(path: &Path) -> String {
        from_path(path)
            .first_or(mime::APPLICATION_OCTET_STREAM)
            .to_string()
    }

    /// Hex encoded SHA256 of the content.
    fn get_sha(data: &[u8]) -> String {
        let digest = Sha256::digest(data);
        format!("{digest:x}")
    }
}

/// Lower-cased extension of `file_name`, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}
