use super::Collection;
use crate::document::Document;
use crate::errors::DbResult;
use crate::types::DocumentId;
use bson::Document as BsonDocument;

impl Collection {
    /// Store `data` under a fresh identifier.
    ///
    /// # Errors
    /// `InvalidDocument` if `data` carries `_id` or an operator-like key;
    /// `DuplicateKey` if a unique index already holds its key. Nothing is
    /// stored on error.
    pub fn insert_document(&self, data: BsonDocument) -> DbResult<DocumentId> {
        let id = self.write().insert(Document::new(data))?;
        self.stats.record_write(1);
        crate::devlog!("{{\"bench\":\"insert\",\"collection\":\"{}\",\"count\":1}}", self.name());
        Ok(id)
    }

    /// Insert all of `docs` or none of them.
    ///
    /// # Errors
    /// As [`Collection::insert_document`], for the first failing document.
    pub fn insert_many<I>(&self, docs: I) -> DbResult<Vec<DocumentId>>
    where
        I: IntoIterator<Item = BsonDocument>,
    {
        let mut st = self.write();
        let mark = st.next_slot();
        let mut ids = Vec::new();
        for data in docs {
            match st.insert(Document::new(data)) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    st.truncate_to(mark);
                    return Err(e);
                }
            }
        }
        drop(st);
        self.stats.record_write(ids.len() as u64);
        crate::devlog!("{{\"bench\":\"insert\",\"collection\":\"{}\",\"count\":{}}}", self.name(), ids.len());
        Ok(ids)
    }

    #[must_use]
    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.read().get(id).cloned()
    }

    /// All documents, cloned, in insertion order.
    #[must_use]
    pub fn get_all_documents(&self) -> Vec<Document> {
        self.read().iter().cloned().collect()
    }

    #[must_use]
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.read().iter().map(|d| d.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DbError;
    use crate::index::IndexSpec;
    use crate::query::Order;
    use bson::doc;

    #[test]
    fn insert_many_is_all_or_nothing() {
        let col = Collection::new("books");
        col.declare_index(IndexSpec::single("title", Order::Asc).unique()).unwrap();
        col.insert_document(doc! {"title": "Dune"}).unwrap();
        let err = col
            .insert_many(vec![doc! {"title": "Emma"}, doc! {"title": "Dune"}])
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));
        assert_eq!(col.len(), 1);
        assert!(col.indexes_consistent());
        let ids = col.insert_many(vec![doc! {"title": "Emma"}]).unwrap();
        assert_eq!(col.list_ids()[1], ids[0]);
    }

    #[test]
    fn find_by_id_returns_stored_payload() {
        let col = Collection::new("books");
        let id = col.insert_document(doc! {"title": "Ubik"}).unwrap();
        assert_eq!(col.find_document(&id).unwrap().data, doc! {"title": "Ubik"});
        assert!(col.find_document(&DocumentId::new()).is_none());
    }
}
