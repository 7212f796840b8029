use crate::errors::{DbError, DbResult};
use crate::query::Order;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexField {
    pub path: String,
    pub order: Order,
}

/// Declaration of a single-field or compound index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    pub fields: Vec<IndexField>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    #[must_use]
    pub fn single(path: impl Into<String>, order: Order) -> Self {
        Self { fields: vec![IndexField { path: path.into(), order }], unique: false }
    }

    #[must_use]
    pub fn compound<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Order)>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(p, order)| IndexField { path: p.into(), order }).collect(),
            unique: false,
        }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Parse a Mongo-style key document such as `{author: 1, published_year: -1}`.
    ///
    /// # Errors
    /// `QueryError` for an empty document or a direction other than `1`/`-1`.
    pub fn from_bson(keys: &BsonDocument) -> DbResult<Self> {
        let mut fields = Vec::with_capacity(keys.len());
        for (path, dir) in keys {
            let order = match dir {
                Bson::Int32(1) | Bson::Int64(1) => Order::Asc,
                Bson::Int32(-1) | Bson::Int64(-1) => Order::Desc,
                Bson::Double(d) if (*d - 1.0).abs() < f64::EPSILON => Order::Asc,
                Bson::Double(d) if (*d + 1.0).abs() < f64::EPSILON => Order::Desc,
                other => {
                    return Err(DbError::QueryError(format!(
                        "index direction for '{path}' must be 1 or -1, got {other}"
                    )));
                }
            };
            fields.push(IndexField { path: path.clone(), order });
        }
        if fields.is_empty() {
            return Err(DbError::QueryError("index key document is empty".into()));
        }
        Ok(Self { fields, unique: false })
    }

    /// Conventional name, e.g. `author_1_published_year_-1`.
    #[must_use]
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}_{}", f.path, f.order.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.path.clone()).collect()
    }

    pub(crate) fn same_paths(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| a.path == b.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub spec: IndexSpec,
    pub keys: usize,
    pub entries: usize,
}
