//! In-memory document query and aggregation engine: predicate filters,
//! projections, stable multi-key sorts, pagination, secondary indexes with
//! a simple planner, single and multi-document mutations, aggregation
//! pipelines and explain reports over `bson` documents.

pub mod aggregate;
pub mod collection;
pub mod config;
pub mod database;
pub mod devlog;
pub mod document;
pub mod errors;
pub mod index;
pub mod logger;
pub mod query;
pub mod types;

pub use collection::Collection;
pub use config::{EngineConfig, LogConfig, QueryLimits};
pub use database::Database;
pub use document::Document;
pub use errors::{DbError, DbResult};
pub use types::DocumentId;
