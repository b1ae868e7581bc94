use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use clap::Parser;
use common::{
    storage::{
        cache::{CacheTtl, DynCache, MemoryCache, SurrealCache},
        db::SurrealDbClient,
        store::StorageManager,
        types::stored_file::StoredFile,
    },
    utils::config::{get_config, AppConfig, CacheBackend},
};
use context_sync::{
    Attachment, ContextSync, ContextSyncConfig, OpenAiFileApi, StorageFileSource,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Upload course files to OpenAI and keep the course vector store in sync
#[derive(Parser, Debug)]
#[command(name = "context-sync", version)]
struct Args {
    /// Course the files belong to
    #[arg(long, env = "CONTEXT_SYNC_COURSE")]
    course: Option<i64>,

    /// Display label applied to every file
    #[arg(long)]
    label: Option<String>,

    /// Files to prepare
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();

    // Get config
    let config = get_config()?;

    let storage = StorageManager::new(&config).await?;
    let cache = build_cache(&config).await?;
    let sync = ContextSync::from_parts(
        ContextSyncConfig::from_app_config(&config),
        cache,
        Arc::new(StorageFileSource::new(storage.clone())),
        Arc::new(OpenAiFileApi::from_config(&config)),
    )?;

    let mut attachments = Vec::with_capacity(args.files.len());
    for path in &args.files {
        attachments.push(load_attachment(&storage, path, &args).await);
    }

    let outcome = sync.sync(&attachments).await;
    let report = serde_json::json!({
        "outcome": outcome,
        "request": outcome.request_fragment(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn build_cache(config: &AppConfig) -> Result<DynCache, Box<dyn std::error::Error>> {
    let ttl = CacheTtl::from_config(config);
    match config.cache_backend {
        CacheBackend::SurrealDb => {
            let db = SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?;
            info!(address = %config.surrealdb_address, "using SurrealDB cache");
            Ok(Arc::new(SurrealCache::new(Arc::new(db), ttl)))
        }
        CacheBackend::Memory => {
            info!("using in-memory cache; nothing persists between runs");
            Ok(Arc::new(MemoryCache::new(ttl)))
        }
    }
}

/// Unreadable paths become attachments without a file, which the sync skips.
async fn load_attachment(storage: &StorageManager, path: &Path, args: &Args) -> Attachment {
    let mut attachment = Attachment {
        file: None,
        label: args.label.clone(),
        course_id: args.course,
    };

    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        error!(path = %path.display(), "path has no usable file name");
        return attachment;
    };

    // The file's own mtime keeps cached uploads valid across runs.
    let modified_at = match tokio::fs::metadata(path).await.and_then(|meta| meta.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified),
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read file metadata");
            return attachment;
        }
    };

    match tokio::fs::read(path).await {
        Ok(data) => {
            match StoredFile::store_with_modified(storage, file_name, Bytes::from(data), modified_at)
                .await
            {
                Ok(stored) => attachment.file = Some(stored),
                Err(err) => error!(path = %path.display(), error = %err, "failed to store file"),
            }
        }
        Err(err) => error!(path = %path.display(), error = %err, "failed to read file"),
    }

    attachment
}
