use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    SurrealDb,
    Memory,
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::SurrealDb
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub surrealdb_address: String,
    #[serde(default)]
    pub surrealdb_username: String,
    #[serde(default)]
    pub surrealdb_password: String,
    #[serde(default)]
    pub surrealdb_namespace: String,
    #[serde(default)]
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_cache_backend")]
    pub cache_backend: CacheBackend,
    #[serde(default = "default_cache_ttl_secs")]
    pub upload_cache_ttl_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub vector_store_cache_ttl_secs: u64,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_vector_store_extensions")]
    pub vector_store_extensions: Vec<String>,
    #[serde(default = "default_responses_extensions")]
    pub responses_extensions: Vec<String>,
    #[serde(default = "default_vector_store_name_prefix")]
    pub vector_store_name_prefix: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Thirty days.
fn default_cache_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_provider() -> String {
    "openai".to_string()
}

pub fn default_vector_store_extensions() -> Vec<String> {
    ["pdf", "doc", "docx", "ppt", "pptx", "rtf", "odt", "odp"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_responses_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_vector_store_name_prefix() -> String {
    "course-context".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            surrealdb_address: String::new(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: String::new(),
            surrealdb_database: String::new(),
            data_dir: default_data_dir(),
            storage: default_storage_kind(),
            cache_backend: default_cache_backend(),
            upload_cache_ttl_secs: default_cache_ttl_secs(),
            vector_store_cache_ttl_secs: default_cache_ttl_secs(),
            provider: default_provider(),
            vector_store_extensions: default_vector_store_extensions(),
            responses_extensions: default_responses_extensions(),
            vector_store_name_prefix: default_vector_store_name_prefix(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("vector_store_extensions")
                .with_list_parse_key("responses_extensions"),
        )
        .build()?;

    config.try_deserialize()
}
