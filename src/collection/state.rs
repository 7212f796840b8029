use super::profile::FieldProfile;
use crate::document::Document;
use crate::errors::{DbError, DbResult};
use crate::index::{DocRef, IndexRegistry};
use crate::types::{DocumentId, ID_FIELD};
use bson::Document as BsonDocument;
use std::collections::{BTreeMap, HashMap};

/// Everything guarded by a collection's lock: documents in insertion (slot)
/// order, the id lookup, the index registry and the field-type profile.
#[derive(Debug, Default)]
pub struct CollectionState {
    pub(crate) docs: BTreeMap<u64, Document>,
    pub(crate) by_id: HashMap<DocumentId, u64>,
    next_slot: u64,
    pub(crate) indexes: IndexRegistry,
    pub(crate) profile: FieldProfile,
}

pub(crate) fn validate_data(data: &BsonDocument) -> DbResult<()> {
    for key in data.keys() {
        if key == ID_FIELD {
            return Err(DbError::InvalidDocument(format!("'{ID_FIELD}' is assigned by the store")));
        }
        if key.is_empty() || key.starts_with('$') || key.contains('.') {
            return Err(DbError::InvalidDocument(format!("invalid field name '{key}'")));
        }
    }
    Ok(())
}

impl CollectionState {
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.by_id.get(id).and_then(|slot| self.docs.get(slot))
    }

    pub(crate) fn slot_docs(&self) -> impl Iterator<Item = (DocRef, &BsonDocument)> {
        self.docs.iter().map(|(slot, d)| (DocRef { slot: *slot, id: d.id.clone() }, &d.data))
    }

    /// Store a new document. Unique indexes are checked first; on error nothing changes.
    pub(crate) fn insert(&mut self, doc: Document) -> DbResult<DocumentId> {
        validate_data(&doc.data)?;
        self.indexes.check_insert(&doc.data, &doc.id)?;
        let slot = self.next_slot;
        self.next_slot += 1;
        let r = DocRef { slot, id: doc.id.clone() };
        self.indexes.insert_all(&doc.data, &r);
        self.profile.add(&doc.data);
        let id = doc.id.clone();
        self.by_id.insert(id.clone(), slot);
        self.docs.insert(slot, doc);
        Ok(id)
    }

    /// Swap the payload at `slot`, returning the previous one. On error
    /// nothing changes.
    pub(crate) fn replace(&mut self, slot: u64, data: BsonDocument) -> DbResult<BsonDocument> {
        let Some(doc) = self.docs.get(&slot) else {
            return Err(DbError::QueryError(format!("no document in slot {slot}")));
        };
        self.indexes.check_insert(&data, &doc.id)?;
        let r = DocRef { slot, id: doc.id.clone() };
        self.indexes.replace_all(&doc.data, &data, &r);
        self.profile.remove(&doc.data);
        self.profile.add(&data);
        let Some(doc) = self.docs.get_mut(&slot) else {
            return Err(DbError::QueryError(format!("no document in slot {slot}")));
        };
        let old = std::mem::replace(&mut doc.data, data);
        doc.touch();
        Ok(old)
    }

    pub(crate) fn remove(&mut self, slot: u64) -> Option<Document> {
        let doc = self.docs.remove(&slot)?;
        let r = DocRef { slot, id: doc.id.clone() };
        self.indexes.remove_all(&doc.data, &r);
        self.profile.remove(&doc.data);
        self.by_id.remove(&doc.id);
        Some(doc)
    }

    /// Undo the most recent inserts made after `next_slot` was `mark`.
    pub(crate) fn truncate_to(&mut self, mark: u64) {
        let newer: Vec<u64> = self.docs.range(mark..).map(|(s, _)| *s).collect();
        for slot in newer {
            self.remove(slot);
        }
        self.next_slot = mark;
    }

    pub(crate) const fn next_slot(&self) -> u64 {
        self.next_slot
    }
}
