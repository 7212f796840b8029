use crate::logger::METRICS_TARGET;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-collection counters, updated lock-free by the executors.
#[derive(Debug, Default)]
pub struct QueryStats {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub index_assisted_total: AtomicU64,
    pub writes_total: AtomicU64,
    pub aggregations_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatsSnapshot {
    pub queries_total: u64,
    pub queries_slow_total: u64,
    pub index_assisted_total: u64,
    pub writes_total: u64,
    pub aggregations_total: u64,
}

impl QueryStats {
    #[must_use]
    pub fn snapshot(&self) -> QueryStatsSnapshot {
        QueryStatsSnapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            queries_slow_total: self.queries_slow_total.load(Ordering::Relaxed),
            index_assisted_total: self.index_assisted_total.load(Ordering::Relaxed),
            writes_total: self.writes_total.load(Ordering::Relaxed),
            aggregations_total: self.aggregations_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_write(&self, n: u64) {
        self.writes_total.fetch_add(n, Ordering::Relaxed);
    }
}

/// Account one read against `stats` and emit a metrics line; slow reads are
/// also warned about on the main log.
pub fn log_query(stats: &QueryStats, collection: &str, op: &str, elapsed: Duration, indexed: bool, slow_ms: u64) {
    stats.queries_total.fetch_add(1, Ordering::Relaxed);
    if indexed {
        stats.index_assisted_total.fetch_add(1, Ordering::Relaxed);
    }
    let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    let slow = ms >= slow_ms;
    if slow {
        stats.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!("slow {op} on {collection}: {ms} ms");
    }
    let line = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "collection": collection,
        "op": op,
        "duration_us": u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        "indexed": indexed,
        "slow": slow,
    });
    log::info!(target: METRICS_TARGET, "{line}");
}
