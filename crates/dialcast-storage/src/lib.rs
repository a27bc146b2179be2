//! Dialcast Storage - Postgres persistence layer
//!
//! Database pool, row models, and repositories for campaigns, recipients,
//! call records, provisioned numbers, and API keys.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
