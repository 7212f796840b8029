mod index_admin;
mod ops;
mod profile;
mod state;

pub use profile::FieldProfile;
pub use state::CollectionState;

use crate::config::QueryLimits;
use crate::query::telemetry::{QueryStats, QueryStatsSnapshot};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A named, insertion-ordered set of documents with its indexes. Share as
/// `Arc<Collection>`; every read holds one read guard for its whole run and
/// every mutation is one write critical section.
#[derive(Debug)]
pub struct Collection {
    name: String,
    limits: QueryLimits,
    state: RwLock<CollectionState>,
    pub(crate) stats: QueryStats,
}

impl Collection {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_limits(name, QueryLimits::default())
    }

    #[must_use]
    pub fn with_limits(name: impl Into<String>, limits: QueryLimits) -> Self {
        Self { name: name.into(), limits, state: RwLock::new(CollectionState::default()), stats: QueryStats::default() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Consistent read-only view for the duration of the guard.
    pub fn read(&self) -> RwLockReadGuard<'_, CollectionState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, CollectionState> {
        self.state.write()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> QueryStatsSnapshot {
        self.stats.snapshot()
    }
}
