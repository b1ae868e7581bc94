pub mod cache;
pub mod db;
pub mod store;
pub mod types;
