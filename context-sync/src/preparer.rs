use std::{collections::HashMap, sync::Arc};

use common::{
    error::AppError,
    storage::{
        cache::{get_typed, set_typed, CacheArea, DynCache},
        types::stored_file::{file_extension, StoredFile},
    },
};
use tracing::{error, info, warn};

use crate::{
    config::ContextSyncConfig,
    services::RemoteFileApi,
    source::FileSource,
    types::{Attachment, PreparedFile, PreparedFiles, UploadCacheEntry},
};

/// Resolves attachments to uploaded remote files, reusing earlier uploads.
pub struct FilePreparer {
    config: ContextSyncConfig,
    cache: DynCache,
    source: Arc<dyn FileSource>,
    api: Arc<dyn RemoteFileApi>,
}

#[derive(Default)]
pub struct FilePreparerBuilder {
    config: Option<ContextSyncConfig>,
    cache: Option<DynCache>,
    source: Option<Arc<dyn FileSource>>,
    api: Option<Arc<dyn RemoteFileApi>>,
}

impl FilePreparerBuilder {
    #[must_use]
    pub fn config(mut self, config: ContextSyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: DynCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn source(mut self, source: Arc<dyn FileSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn api(mut self, api: Arc<dyn RemoteFileApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn build(self) -> Result<FilePreparer, AppError> {
        Ok(FilePreparer {
            config: self.config.unwrap_or_default(),
            cache: self
                .cache
                .ok_or_else(|| AppError::Config("file preparer requires a cache store".into()))?,
            source: self
                .source
                .ok_or_else(|| AppError::Config("file preparer requires a file source".into()))?,
            api: self
                .api
                .ok_or_else(|| AppError::Config("file preparer requires a remote file api".into()))?,
        })
    }
}

/// Outcome of resolving one content hash within a call.
enum Resolution {
    Ready(PreparedFile),
    Failed,
}

impl FilePreparer {
    pub fn builder() -> FilePreparerBuilder {
        FilePreparerBuilder::default()
    }

    /// Deduplicates, filters and uploads `attachments`.
    ///
    /// Never fails: problems with a single attachment put its file name in
    /// `skipped` and processing continues with the next one.
    pub async fn prepare(&self, attachments: &[Attachment]) -> PreparedFiles {
        let mut result = PreparedFiles::default();
        let mut resolved: HashMap<String, Resolution> = HashMap::new();

        for attachment in attachments {
            if result.course_id.is_none() {
                result.course_id = attachment.course_id;
            }

            let Some(file) = attachment.file.as_ref() else {
                continue;
            };

            match resolved.get(&file.content_hash) {
                Some(Resolution::Ready(prepared)) => {
                    result.files.push(prepared.clone());
                    continue;
                }
                Some(Resolution::Failed) => {
                    result.skipped.push(file.file_name.clone());
                    continue;
                }
                None => {}
            }

            let extension = file.extension().unwrap_or_default();
            if !self.config.allows_vector_store(&extension) {
                warn!(
                    file_name = %file.file_name,
                    extension = %extension,
                    "skipping file with unsupported extension"
                );
                result.skipped.push(file.file_name.clone());
                continue;
            }

            let course_id = attachment.course_id.or(result.course_id);
            let resolution = match self.resolve(file, attachment, course_id, &extension).await {
                Some(prepared) => {
                    result.files.push(prepared.clone());
                    Resolution::Ready(prepared)
                }
                None => {
                    result.skipped.push(file.file_name.clone());
                    Resolution::Failed
                }
            };
            resolved.insert(file.content_hash.clone(), resolution);
        }

        result
    }

    async fn resolve(
        &self,
        file: &StoredFile,
        attachment: &Attachment,
        course_id: Option<i64>,
        extension: &str,
    ) -> Option<PreparedFile> {
        let cache_key = self.config.upload_cache_key(&file.content_hash);

        if let Some(cached) = self.reusable_entry(&cache_key, file).await {
            info!(
                content_hash = %file.content_hash,
                file_id = %cached.file_id,
                "reusing cached id"
            );
            let allow_responses = file_extension(&cached.file_name)
                .is_some_and(|ext| self.config.allows_responses(&ext));
            return Some(PreparedFile {
                file_id: cached.file_id,
                label: attachment.label.clone(),
                file_name: cached.file_name,
                course_id: course_id.or(cached.course_id),
                allow_responses,
            });
        }

        let file_id = self.upload(file).await?;

        let allow_responses = self.config.allows_responses(extension);
        if !allow_responses {
            info!(
                file_name = %file.file_name,
                file_id = %file_id,
                "file is only available through the vector store"
            );
        }

        let entry = UploadCacheEntry {
            file_id: file_id.clone(),
            file_name: file.file_name.clone(),
            time_modified: file.modified_timestamp(),
            mime_type: file.mime_type.clone(),
            course_id,
        };
        if let Err(err) = set_typed(self.cache.as_ref(), CacheArea::Uploads, &cache_key, &entry).await
        {
            warn!(
                content_hash = %file.content_hash,
                error = %err,
                "failed to cache uploaded file id"
            );
        }

        Some(PreparedFile {
            file_id,
            label: attachment.label.clone(),
            file_name: file.file_name.clone(),
            course_id,
            allow_responses,
        })
    }

    /// A cached upload is reusable while it is at least as new as the source and
    /// its file name still carries an allowed extension.
    async fn reusable_entry(&self, cache_key: &str, file: &StoredFile) -> Option<UploadCacheEntry> {
        let cached: UploadCacheEntry =
            match get_typed(self.cache.as_ref(), CacheArea::Uploads, cache_key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => return None,
                Err(err) => {
                    warn!(cache_key, error = %err, "upload cache lookup failed");
                    return None;
                }
            };

        let extension_allowed = file_extension(&cached.file_name)
            .is_some_and(|ext| self.config.allows_vector_store(&ext));

        (cached.time_modified >= file.modified_timestamp()
            && extension_allowed
            && !cached.file_id.trim().is_empty())
        .then_some(cached)
    }

    /// Uploads through a temporary copy that is removed before returning.
    async fn upload(&self, file: &StoredFile) -> Option<String> {
        let materialized = match self.source.materialize(file).await {
            Ok(materialized) => materialized,
            Err(err) => {
                error!(
                    file_name = %file.file_name,
                    content_hash = %file.content_hash,
                    error = %err,
                    "failed to create temporary file for upload"
                );
                return None;
            }
        };

        let uploaded = self
            .api
            .upload_file(materialized.path(), &file.file_name, &file.mime_type)
            .await;
        drop(materialized);

        match uploaded {
            Ok(file_id) if !file_id.trim().is_empty() => Some(file_id),
            Ok(_) => {
                error!(file_name = %file.file_name, "upload returned no file id");
                None
            }
            Err(err) => {
                error!(file_name = %file.file_name, error = %err, "file upload failed");
                None
            }
        }
    }
}
