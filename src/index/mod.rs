mod btree;
mod descriptor;
mod key;
mod plan;
mod registry;

pub use btree::{BTreeIndex, IndexStats, ScanBounds};
pub use descriptor::{IndexDescriptor, IndexField, IndexSpec};
pub use key::{DocRef, IndexKey, KeyValue, display_key, key_for};
pub use plan::{CostClass, QueryPlan};
pub use registry::IndexRegistry;
