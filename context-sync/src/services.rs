use std::{path::Path, sync::Arc};

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        CreateFileRequestArgs, CreateVectorStoreFileBatchRequestArgs,
        CreateVectorStoreRequestArgs, FileInput, FilePurpose,
    },
    Client,
};
use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};
use tracing::{debug, info};

/// Remote file storage and vector store operations.
#[async_trait]
pub trait RemoteFileApi: Send + Sync {
    /// Uploads the file at `path` and returns its remote id.
    async fn upload_file(
        &self,
        path: &Path,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, AppError>;

    /// Creates a vector store and returns its id.
    async fn create_vector_store(&self, name: &str) -> Result<String, AppError>;

    /// `Ok(false)` when the provider reports the store as unknown.
    async fn vector_store_exists(&self, vector_store_id: &str) -> Result<bool, AppError>;

    /// Attaches `file_ids` to the store in one batch.
    async fn attach_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: &[String],
    ) -> Result<(), AppError>;
}

pub struct OpenAiFileApi {
    client: Arc<Client<OpenAIConfig>>,
}

impl OpenAiFileApi {
    pub fn new(client: Arc<Client<OpenAIConfig>>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        )))
    }
}

#[async_trait]
impl RemoteFileApi for OpenAiFileApi {
    async fn upload_file(
        &self,
        path: &Path,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, AppError> {
        // The temporary copy has a sanitized name; upload under the original one.
        let data = tokio::fs::read(path).await?;
        let request = CreateFileRequestArgs::default()
            .file(FileInput::from_vec_u8(file_name.to_string(), data))
            .purpose(FilePurpose::Assistants)
            .build()?;

        let uploaded = self.client.files().create(request).await?;
        debug!(file_id = %uploaded.id, file_name, mime_type, "uploaded file");

        Ok(uploaded.id)
    }

    async fn create_vector_store(&self, name: &str) -> Result<String, AppError> {
        let request = CreateVectorStoreRequestArgs::default().name(name).build()?;

        let store = self.client.vector_stores().create(request).await?;
        info!(vector_store_id = %store.id, name, "created vector store");

        Ok(store.id)
    }

    async fn vector_store_exists(&self, vector_store_id: &str) -> Result<bool, AppError> {
        match self.client.vector_stores().retrieve(vector_store_id).await {
            Ok(store) => Ok(store.id == vector_store_id),
            Err(OpenAIError::ApiError(err)) => {
                debug!(vector_store_id, error = %err.message, "vector store lookup rejected");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn attach_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: &[String],
    ) -> Result<(), AppError> {
        let request = CreateVectorStoreFileBatchRequestArgs::default()
            .file_ids(file_ids.to_vec())
            .build()?;

        let batch = self
            .client
            .vector_stores()
            .file_batches(vector_store_id)
            .create(request)
            .await?;
        debug!(
            vector_store_id,
            batch_id = %batch.id,
            file_count = file_ids.len(),
            "attached file batch"
        );

        Ok(())
    }
}
