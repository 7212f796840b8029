mod model;
mod value;

pub use model::{Document, Metadata};
pub use value::{
    MAX_PATH_DEPTH, Number, TypeClass, as_f64, bson_eq, compare_bson, flatten_paths, get_path, insert_path,
};
