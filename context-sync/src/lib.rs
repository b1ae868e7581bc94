#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod config;
pub mod preparer;
pub mod services;
pub mod source;
pub mod sync;
pub mod types;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ContextSyncConfig, DEFAULT_COURSE_ID};
pub use preparer::FilePreparer;
pub use services::{OpenAiFileApi, RemoteFileApi};
pub use source::{FileSource, MaterializedFile, StorageFileSource};
pub use sync::{ContextSync, SyncOutcome};
pub use types::{Attachment, PreparedFile, PreparedFiles};
pub use vector_store::VectorStoreReconciler;
