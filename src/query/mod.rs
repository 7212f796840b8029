pub mod telemetry;

mod cursor;
pub mod eval;
pub(crate) mod exec;
mod explain;
mod parse;
mod types;

pub use cursor::Cursor;
pub use eval::{check_filter, compare_docs, eval_filter, matches, project_record};
pub use exec::{apply_update, count_docs, delete_many, delete_one, find_docs, update_many, update_one};
pub use exec::{count_docs as count, find_docs as find};
pub use explain::{DurationClass, ExplainReport, explain};
pub use parse::{parse_filter, parse_filter_json, parse_projection, parse_sort, parse_update, parse_update_json};
#[cfg(feature = "regex")]
pub use types::Pattern;
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, Order, Projection, ProjectionMode, SortSpec, UpdateDoc, UpdateReport,
};
