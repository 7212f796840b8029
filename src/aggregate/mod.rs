mod expr;
mod parse;
mod pipeline;
mod types;

pub use expr::eval_expr;
pub use parse::{parse_expr, parse_pipeline, parse_pipeline_json};
pub use pipeline::{aggregate, apply_stage, run};
pub use types::{Accumulator, Expr, GroupSpec, ProjectField, Stage};
