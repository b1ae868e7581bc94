use std::collections::HashSet;

use common::utils::config::AppConfig;

/// Course id used for cache keys and store names when a batch has none.
pub const DEFAULT_COURSE_ID: i64 = 0;

#[derive(Debug, Clone)]
pub struct ContextSyncConfig {
    /// Remote provider name, first half of every cache key.
    pub provider: String,
    /// Extensions accepted for upload and vector store indexing.
    pub vector_store_extensions: HashSet<String>,
    /// Extensions that may also be referenced directly in a Responses request.
    pub responses_extensions: HashSet<String>,
    pub vector_store_name_prefix: String,
}

impl ContextSyncConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            vector_store_extensions: normalize(&config.vector_store_extensions),
            responses_extensions: normalize(&config.responses_extensions),
            vector_store_name_prefix: config.vector_store_name_prefix.clone(),
        }
    }

    pub fn allows_vector_store(&self, extension: &str) -> bool {
        self.vector_store_extensions.contains(extension)
    }

    pub fn allows_responses(&self, extension: &str) -> bool {
        self.responses_extensions.contains(extension)
    }

    pub fn upload_cache_key(&self, content_hash: &str) -> String {
        format!("{}_{content_hash}", self.provider)
    }

    pub fn vector_store_cache_key(&self, course_id: i64) -> String {
        format!("{}_{course_id}", self.provider)
    }

    pub fn vector_store_name(&self, course_id: i64) -> String {
        format!("{}-{course_id}", self.vector_store_name_prefix)
    }
}

impl Default for ContextSyncConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

fn normalize(extensions: &[String]) -> HashSet<String> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extension_sets() {
        let config = ContextSyncConfig::default();

        for ext in ["pdf", "doc", "docx", "ppt", "pptx", "rtf", "odt", "odp"] {
            assert!(config.allows_vector_store(ext), "{ext} should be allowed");
        }
        assert!(!config.allows_vector_store("txt"));
        assert!(!config.allows_vector_store("png"));

        assert!(config.allows_responses("pdf"));
        assert!(!config.allows_responses("docx"));
    }

    #[test]
    fn configured_extensions_are_normalized() {
        let app = AppConfig {
            vector_store_extensions: vec![" .PDF".into(), "Docx".into(), String::new()],
            ..Default::default()
        };
        let config = ContextSyncConfig::from_app_config(&app);

        assert_eq!(config.vector_store_extensions.len(), 2);
        assert!(config.allows_vector_store("pdf"));
        assert!(config.allows_vector_store("docx"));
    }

    #[test]
    fn keys_and_names_are_deterministic() {
        let config = ContextSyncConfig::default();

        assert_eq!(config.upload_cache_key("abc"), "openai_abc");
        assert_eq!(config.vector_store_cache_key(42), "openai_42");
        assert_eq!(config.vector_store_name(42), "course-context-42");
        assert_eq!(
            config.vector_store_name(DEFAULT_COURSE_ID),
            "course-context-0"
        );
    }
}
