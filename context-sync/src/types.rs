use std::collections::HashSet;

use common::storage::types::stored_file::StoredFile;
use serde::{Deserialize, Serialize};

/// A file offered as AI context, plus optional presentation data.
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    pub file: Option<StoredFile>,
    pub label: Option<String>,
    pub course_id: Option<i64>,
}

impl Attachment {
    pub fn new(file: StoredFile) -> Self {
        Self {
            file: Some(file),
            label: None,
            course_id: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_course_id(mut self, course_id: i64) -> Self {
        self.course_id = Some(course_id);
        self
    }
}

/// An uploaded file ready to be referenced by a downstream request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreparedFile {
    pub file_id: String,
    pub label: Option<String>,
    pub file_name: String,
    pub course_id: Option<i64>,
    /// `false` means the file is only reachable through the vector store.
    pub allow_responses: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreparedFiles {
    pub files: Vec<PreparedFile>,
    pub course_id: Option<i64>,
    pub skipped: Vec<String>,
}

impl PreparedFiles {
    /// Distinct remote file ids in first-seen order.
    pub fn file_ids(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut ids = Vec::new();
        for file in &self.files {
            if seen.insert(file.file_id.as_str()) {
                ids.push(file.file_id.clone());
            }
        }
        ids
    }
}

/// Cached result of a previous upload, keyed by provider and content hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadCacheEntry {
    pub file_id: String,
    pub file_name: String,
    pub time_modified: i64,
    pub mime_type: String,
    pub course_id: Option<i64>,
}

/// Cached vector store for a course and the file ids confirmed attached to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorStoreCacheEntry {
    pub vector_store_id: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(file_id: &str, name: &str) -> PreparedFile {
        PreparedFile {
            file_id: file_id.into(),
            label: None,
            file_name: name.into(),
            course_id: None,
            allow_responses: false,
        }
    }

    #[test]
    fn file_ids_are_distinct_and_ordered() {
        let result = PreparedFiles {
            files: vec![
                prepared("file-b", "b.pdf"),
                prepared("file-a", "a.pdf"),
                prepared("file-b", "copy-of-b.pdf"),
            ],
            course_id: None,
            skipped: Vec::new(),
        };

        assert_eq!(result.file_ids(), vec!["file-b", "file-a"]);
    }

    #[test]
    fn vector_store_entry_tolerates_missing_file_ids() {
        let entry: VectorStoreCacheEntry =
            serde_json::from_value(serde_json::json!({"vector_store_id": "vs_1"}))
                .expect("decode");

        assert_eq!(entry.vector_store_id.as_deref(), Some("vs_1"));
        assert!(entry.file_ids.is_empty());
    }
}
