//! In-memory collaborators for exercising the sync core without a network.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::{error::AppError, storage::types::stored_file::StoredFile};
use tokio::sync::Mutex;

use crate::{
    services::RemoteFileApi,
    source::{FileSource, MaterializedFile},
};

/// A stored file handle with a fixed timestamp; no bytes are written anywhere.
pub fn stored_file(file_name: &str, content_hash: &str) -> StoredFile {
    let mime_type = if file_name.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    };
    StoredFile {
        location: format!("files/{content_hash}"),
        file_name: file_name.to_string(),
        content_hash: content_hash.to_string(),
        mime_type: mime_type.to_string(),
        modified_at: Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_else(Utc::now),
    }
}

/// Writes real temporary files so cleanup can be observed.
#[derive(Default)]
pub struct FakeFileSource {
    failing: HashSet<String>,
    paths: Mutex<Vec<PathBuf>>,
}

impl FakeFileSource {
    pub fn fail_for(mut self, file_name: &str) -> Self {
        self.failing.insert(file_name.to_string());
        self
    }

    pub async fn materialized(&self) -> Vec<PathBuf> {
        self.paths.lock().await.clone()
    }

    /// Temporary files that still exist on disk.
    pub async fn live_paths(&self) -> usize {
        self.paths
            .lock()
            .await
            .iter()
            .filter(|path| path.exists())
            .count()
    }
}

#[async_trait]
impl FileSource for FakeFileSource {
    async fn materialize(&self, file: &StoredFile) -> Result<MaterializedFile, AppError> {
        if self.failing.contains(&file.file_name) {
            return Err(AppError::NotFound(format!(
                "no content for {}",
                file.content_hash
            )));
        }
        let materialized =
            MaterializedFile::write(&file.file_name, file.content_hash.as_bytes()).await?;
        self.paths
            .lock()
            .await
            .push(materialized.path().to_path_buf());
        Ok(materialized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Upload(String),
    CreateStore(String),
    Probe(String),
    Attach(String, Vec<String>),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<ApiCall>,
    live_stores: HashSet<String>,
    next_id: u32,
}

/// Records every call and hands out sequential ids.
#[derive(Default)]
pub struct FakeRemoteFileApi {
    fail_uploads: HashSet<String>,
    fail_all_uploads: bool,
    empty_ids: HashSet<String>,
    fail_create: bool,
    fail_attach: Mutex<bool>,
    fail_probe: bool,
    state: Mutex<FakeState>,
}

impl FakeRemoteFileApi {
    pub fn fail_upload_for(mut self, file_name: &str) -> Self {
        self.fail_uploads.insert(file_name.to_string());
        self
    }

    pub fn fail_all_uploads(mut self) -> Self {
        self.fail_all_uploads = true;
        self
    }

    pub fn empty_id_for(mut self, file_name: &str) -> Self {
        self.empty_ids.insert(file_name.to_string());
        self
    }

    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn fail_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    pub async fn set_attach_failing(&self, failing: bool) {
        *self.fail_attach.lock().await = failing;
    }

    /// Marks a store as existing remotely, as if created earlier.
    pub async fn add_live_store(&self, vector_store_id: &str) {
        self.state
            .lock()
            .await
            .live_stores
            .insert(vector_store_id.to_string());
    }

    /// Simulates the store being deleted out of band.
    pub async fn delete_store(&self, vector_store_id: &str) {
        self.state.lock().await.live_stores.remove(vector_store_id);
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn uploads(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Upload(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub async fn attach_calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Attach(store, ids) => Some((store, ids)),
                _ => None,
            })
            .collect()
    }

    pub async fn created_stores(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::CreateStore(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteFileApi for FakeRemoteFileApi {
    async fn upload_file(
        &self,
        path: &Path,
        file_name: &str,
        _mime_type: &str,
    ) -> Result<String, AppError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::Upload(file_name.to_string()));

        if !path.exists() {
            return Err(AppError::InternalError(format!(
                "upload path {} does not exist",
                path.display()
            )));
        }
        if self.fail_all_uploads || self.fail_uploads.contains(file_name) {
            return Err(AppError::RemoteApi(format!("upload of {file_name} rejected")));
        }
        if self.empty_ids.contains(file_name) {
            return Ok(String::new());
        }

        state.next_id += 1;
        Ok(format!("file-{}", state.next_id))
    }

    async fn create_vector_store(&self, name: &str) -> Result<String, AppError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::CreateStore(name.to_string()));

        if self.fail_create {
            return Err(AppError::RemoteApi("vector store creation failed".into()));
        }

        state.next_id += 1;
        let id = format!("vs_{}", state.next_id);
        state.live_stores.insert(id.clone());
        Ok(id)
    }

    async fn vector_store_exists(&self, vector_store_id: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::Probe(vector_store_id.to_string()));

        if self.fail_probe {
            return Err(AppError::RemoteApi("probe timed out".into()));
        }
        Ok(state.live_stores.contains(vector_store_id))
    }

    async fn attach_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: &[String],
    ) -> Result<(), AppError> {
        let failing = *self.fail_attach.lock().await;
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::Attach(
            vector_store_id.to_string(),
            file_ids.to_vec(),
        ));

        if failing {
            return Err(AppError::RemoteApi("file batch rejected".into()));
        }
        Ok(())
    }
}
