use std::{collections::HashSet, sync::Arc};

use common::{error::AppError, storage::cache::DynCache};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    config::ContextSyncConfig,
    preparer::FilePreparer,
    services::RemoteFileApi,
    source::FileSource,
    types::{Attachment, PreparedFile},
    vector_store::VectorStoreReconciler,
};

/// Everything a downstream AI request needs from one sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncOutcome {
    pub files: Vec<PreparedFile>,
    pub course_id: Option<i64>,
    pub vector_store_id: Option<String>,
    pub skipped: Vec<String>,
}

impl SyncOutcome {
    /// JSON pieces to merge into a Responses API request.
    ///
    /// `content` holds an `input_file` part per responses-eligible file and
    /// `tools` a `file_search` entry when a vector store is available.
    pub fn request_fragment(&self) -> Value {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut content: Vec<Value> = Vec::new();
        for file in &self.files {
            if file.allow_responses && seen.insert(file.file_id.as_str()) {
                content.push(json!({ "type": "input_file", "file_id": file.file_id }));
            }
        }

        let tools: Vec<Value> = self
            .vector_store_id
            .iter()
            .map(|id| json!({ "type": "file_search", "vector_store_ids": [id] }))
            .collect();

        json!({ "content": content, "tools": tools })
    }
}

/// Runs the file preparer and feeds its output into the vector store reconciler.
pub struct ContextSync {
    preparer: FilePreparer,
    reconciler: VectorStoreReconciler,
}

impl ContextSync {
    pub fn new(preparer: FilePreparer, reconciler: VectorStoreReconciler) -> Self {
        Self {
            preparer,
            reconciler,
        }
    }

    /// Wires both components to the same collaborators.
    pub fn from_parts(
        config: ContextSyncConfig,
        cache: DynCache,
        source: Arc<dyn FileSource>,
        api: Arc<dyn RemoteFileApi>,
    ) -> Result<Self, AppError> {
        let preparer = FilePreparer::builder()
            .config(config.clone())
            .cache(Arc::clone(&cache))
            .source(source)
            .api(Arc::clone(&api))
            .build()?;
        let reconciler = VectorStoreReconciler::builder()
            .config(config)
            .cache(cache)
            .api(api)
            .build()?;

        Ok(Self::new(preparer, reconciler))
    }

    #[tracing::instrument(skip_all, fields(attachments = attachments.len()))]
    pub async fn sync(&self, attachments: &[Attachment]) -> SyncOutcome {
        let prepared = self.preparer.prepare(attachments).await;
        let vector_store_id = self
            .reconciler
            .ensure(prepared.course_id, &prepared.file_ids())
            .await;

        info!(
            files = prepared.files.len(),
            skipped = prepared.skipped.len(),
            course_id = ?prepared.course_id,
            vector_store_id = ?vector_store_id,
            "context sync finished"
        );

        SyncOutcome {
            files: prepared.files,
            course_id: prepared.course_id,
            vector_store_id,
            skipped: prepared.skipped,
        }
    }
}
