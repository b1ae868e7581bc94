use std::{collections::HashSet, sync::Arc};

use common::{
    error::AppError,
    storage::cache::{get_typed, set_typed, CacheArea, DynCache},
};
use tracing::{debug, error, info, warn};

use crate::{
    config::{ContextSyncConfig, DEFAULT_COURSE_ID},
    services::RemoteFileApi,
    types::VectorStoreCacheEntry,
};

/// Keeps one remote vector store per course in sync with its uploaded files.
pub struct VectorStoreReconciler {
    config: ContextSyncConfig,
    cache: DynCache,
    api: Arc<dyn RemoteFileApi>,
}

#[derive(Default)]
pub struct VectorStoreReconcilerBuilder {
    config: Option<ContextSyncConfig>,
    cache: Option<DynCache>,
    api: Option<Arc<dyn RemoteFileApi>>,
}

impl VectorStoreReconcilerBuilder {
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
    pub fn api(mut self, api: Arc<dyn RemoteFileApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn build(self) -> Result<VectorStoreReconciler, AppError> {
        Ok(VectorStoreReconciler {
            config: self.config.unwrap_or_default(),
            cache: self.cache.ok_or_else(|| {
                AppError::Config("vector store reconciler requires a cache store".into())
            })?,
            api: self.api.ok_or_else(|| {
                AppError::Config("vector store reconciler requires a remote file api".into())
            })?,
        })
    }
}

impl VectorStoreReconciler {
    pub fn builder() -> VectorStoreReconcilerBuilder {
        VectorStoreReconcilerBuilder::default()
    }

    /// Returns the course's store id after making sure it holds `file_ids`.
    ///
    /// Only ids not yet confirmed attached are sent. Returns `None` when there
    /// is nothing to index or no store could be created.
    pub async fn ensure(&self, course_id: Option<i64>, file_ids: &[String]) -> Option<String> {
        if file_ids.is_empty() {
            return None;
        }

        let course_id = course_id.unwrap_or(DEFAULT_COURSE_ID);
        let cache_key = self.config.vector_store_cache_key(course_id);
        let mut entry = self.cached_entry(&cache_key).await;

        if let Some(vector_store_id) = entry.vector_store_id.as_deref() {
            if !self.store_exists(vector_store_id).await {
                warn!(
                    course_id,
                    vector_store_id,
                    "cached vector store no longer exists; recreating"
                );
                entry = VectorStoreCacheEntry::default();
            }
        }

        let vector_store_id = match entry.vector_store_id.clone() {
            Some(id) => id,
            None => self.create_store(course_id).await?,
        };
        entry.vector_store_id = Some(vector_store_id.clone());

        let known: HashSet<&str> = entry.file_ids.iter().map(String::as_str).collect();
        let mut queued: HashSet<&str> = HashSet::new();
        let mut delta: Vec<String> = Vec::new();
        for id in file_ids {
            if !known.contains(id.as_str()) && queued.insert(id.as_str()) {
                delta.push(id.clone());
            }
        }

        if delta.is_empty() {
            debug!(course_id, %vector_store_id, "vector store already holds all files");
        } else {
            match self.api.attach_file_batch(&vector_store_id, &delta).await {
                Ok(()) => {
                    info!(
                        course_id,
                        %vector_store_id,
                        attached = delta.len(),
                        "attached files to vector store"
                    );
                    merge_file_ids(&mut entry.file_ids, file_ids);
                }
                Err(err) => {
                    error!(
                        course_id,
                        %vector_store_id,
                        error = %err,
                        "failed to attach files to vector store"
                    );
                }
            }
        }

        if let Err(err) =
            set_typed(self.cache.as_ref(), CacheArea::VectorStores, &cache_key, &entry).await
        {
            warn!(course_id, error = %err, "failed to cache vector store state");
        }

        Some(vector_store_id)
    }

    async fn cached_entry(&self, cache_key: &str) -> VectorStoreCacheEntry {
        match get_typed(self.cache.as_ref(), CacheArea::VectorStores, cache_key).await {
            Ok(entry) => entry.unwrap_or_default(),
            Err(err) => {
                warn!(cache_key, error = %err, "vector store cache lookup failed");
                VectorStoreCacheEntry::default()
            }
        }
    }

    /// A failed probe reads the same as a missing store.
    async fn store_exists(&self, vector_store_id: &str) -> bool {
        match self.api.vector_store_exists(vector_store_id).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(vector_store_id, error = %err, "vector store probe failed");
                false
            }
        }
    }

    async fn create_store(&self, course_id: i64) -> Option<String> {
        let name = self.config.vector_store_name(course_id);
        match self.api.create_vector_store(&name).await {
            Ok(id) if !id.trim().is_empty() => Some(id),
            Ok(_) => {
                error!(course_id, %name, "vector store creation returned no id");
                None
            }
            Err(err) => {
                error!(course_id, %name, error = %err, "failed to create vector store");
                None
            }
        }
    }
}

fn merge_file_ids(known: &mut Vec<String>, file_ids: &[String]) {
    let mut seen: HashSet<String> = known.iter().cloned().collect();
    for id in file_ids {
        if seen.insert(id.clone()) {
            known.push(id.clone());
        }
    }
}
