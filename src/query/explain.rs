use crate::collection::Collection;
use crate::errors::DbResult;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::exec::run_find;
use super::types::{Filter, FindOptions};

/// Coarse cost bucket derived from the number of documents examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DurationClass {
    Negligible,
    Moderate,
    Heavy,
}

impl DurationClass {
    #[must_use]
    pub const fn for_scanned(scanned: usize) -> Self {
        match scanned {
            0..=1_000 => Self::Negligible,
            1_001..=100_000 => Self::Moderate,
            _ => Self::Heavy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainReport {
    pub used_index: bool,
    pub index_name: Option<String>,
    pub sort_covered: bool,
    pub keys_examined: usize,
    pub scanned_count: usize,
    pub returned_count: usize,
    pub execution_time_micros: u64,
    pub estimated_duration: DurationClass,
}

/// Execute `filter`/`opts` under a read lock and report the plan and counts.
/// Results are discarded and statistics are not touched.
///
/// # Errors
/// Whatever `find_docs` would return for the same arguments.
pub fn explain(col: &Collection, filter: &Filter, opts: &FindOptions) -> DbResult<ExplainReport> {
    let start = Instant::now();
    let st = col.read();
    let run = run_find(&st, filter, opts, col.limits())?;
    drop(st);
    let micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    Ok(ExplainReport {
        used_index: run.plan.used_index(),
        index_name: run.plan.index.clone(),
        sort_covered: run.plan.sort_covered,
        keys_examined: run.keys_examined,
        scanned_count: run.scanned,
        returned_count: run.records.len(),
        execution_time_micros: micros,
        estimated_duration: DurationClass::for_scanned(run.scanned),
    })
}
