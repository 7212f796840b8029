use crate::types::{DocumentId, ID_FIELD};
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// One schema-less record. `data` never holds the reserved `_id` key; the
/// identifier lives in `id` and is rendered into result records on demand.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self { id: DocumentId::new(), data, metadata: Metadata::new() }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.data.get(field)
    }

    /// Replace the payload, keeping the identifier.
    pub fn update(&mut self, new_data: BsonDocument) {
        self.data = new_data;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }

    /// Render as a result record: `_id` first, then the data fields in stored order.
    #[must_use]
    pub fn to_record(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        out.insert(ID_FIELD, Bson::String(self.id.to_string()));
        for (k, v) in &self.data {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}
