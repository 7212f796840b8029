use crate::aggregate::{self, Stage};
use crate::collection::Collection;
use crate::config::EngineConfig;
use crate::errors::{DbError, DbResult};
use crate::query::{self, Cursor, DeleteReport, ExplainReport, Filter, FindOptions, UpdateDoc, UpdateReport};
use bson::Document as BsonDocument;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of named collections sharing one engine configuration.
#[derive(Debug, Default)]
pub struct Database {
    config: EngineConfig,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl Database {
    /// In-memory database with default limits and no logger installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Database using `config`; installs the rolling-file logger when a log
    /// directory is configured.
    ///
    /// # Errors
    /// `Logging` when the logger can't be built or installed.
    pub fn open(config: EngineConfig) -> DbResult<Self> {
        crate::logger::init(&config.log)?;
        log::info!("database opened (max_limit={}, slow_query_ms={})", config.query.max_limit, config.query.slow_query_ms);
        Ok(Self { config, collections: RwLock::new(HashMap::new()) })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the collection called `name`, creating it if needed.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        let mut cols = self.collections.write();
        Arc::clone(cols.entry(name.to_string()).or_insert_with(|| {
            log::debug!("collection '{name}' created");
            Arc::new(Collection::with_limits(name, self.config.query.clone()))
        }))
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Removes the collection from the registry; existing handles keep working.
    pub fn drop_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    /// Collection names, sorted.
    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// # Errors
    /// `NoSuchCollection` when `name` isn't registered.
    pub fn collection(&self, name: &str) -> DbResult<Arc<Collection>> {
        self.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`query::find_docs`].
    pub fn find(&self, collection: &str, filter: &Filter, opts: &FindOptions) -> DbResult<Cursor> {
        query::find_docs(&*self.collection(collection)?, filter, opts)
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`query::count_docs`].
    pub fn count(&self, collection: &str, filter: &Filter) -> DbResult<usize> {
        query::count_docs(&*self.collection(collection)?, filter)
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`query::update_one`].
    pub fn update_one(&self, collection: &str, filter: &Filter, update: &UpdateDoc) -> DbResult<UpdateReport> {
        query::update_one(&*self.collection(collection)?, filter, update)
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`query::update_many`].
    pub fn update_many(&self, collection: &str, filter: &Filter, update: &UpdateDoc) -> DbResult<UpdateReport> {
        query::update_many(&*self.collection(collection)?, filter, update)
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`query::delete_one`].
    pub fn delete_one(&self, collection: &str, filter: &Filter) -> DbResult<DeleteReport> {
        query::delete_one(&*self.collection(collection)?, filter)
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`query::delete_many`].
    pub fn delete_many(&self, collection: &str, filter: &Filter) -> DbResult<DeleteReport> {
        query::delete_many(&*self.collection(collection)?, filter)
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`aggregate::run`].
    pub fn aggregate(&self, collection: &str, stages: &[Stage]) -> DbResult<Vec<BsonDocument>> {
        aggregate::run(&*self.collection(collection)?, stages)
    }

    /// # Errors
    /// `NoSuchCollection`, or any error of [`query::explain`].
    pub fn explain(&self, collection: &str, filter: &Filter, opts: &FindOptions) -> DbResult<ExplainReport> {
        query::explain(&*self.collection(collection)?, filter, opts)
    }
}
