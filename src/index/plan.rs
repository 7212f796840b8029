use super::btree::ScanBounds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostClass {
    Indexed,
    FullScan,
}

/// Outcome of planning a read: which index (if any) narrows the candidate set
/// or matches the requested order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub index: Option<String>,
    /// Index fields consumed by the predicate, in index order.
    pub key_fields: Vec<String>,
    /// Present when the predicate narrows the scan.
    pub bounds: Option<ScanBounds>,
    pub sort_covered: bool,
    pub cost: CostClass,
}

impl QueryPlan {
    #[must_use]
    pub const fn full_scan() -> Self {
        Self { index: None, key_fields: Vec::new(), bounds: None, sort_covered: false, cost: CostClass::FullScan }
    }

    #[must_use]
    pub const fn used_index(&self) -> bool {
        self.index.is_some()
    }
}
