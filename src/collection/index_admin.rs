use super::Collection;
use crate::errors::DbResult;
use crate::index::{BTreeIndex, IndexDescriptor, IndexSpec, QueryPlan};
use crate::query::{Filter, SortSpec};
use crate::types::DocumentId;
use bson::Document as BsonDocument;

impl Collection {
    /// Declare an index and build it from the current documents. Declaring
    /// an identical spec again returns the existing name without rebuilding.
    ///
    /// # Errors
    /// `IndexConflict` for the same fields with a different definition,
    /// `DuplicateKey` when a unique index can't be built.
    pub fn declare_index(&self, spec: IndexSpec) -> DbResult<String> {
        let mut st = self.write();
        let st = &mut *st;
        let (name, created) = st.indexes.declare(spec, st.docs.iter().map(|(slot, d)| {
            (crate::index::DocRef { slot: *slot, id: d.id.clone() }, &d.data)
        }))?;
        if created
            && let Some(idx) = st.indexes.get(&name)
        {
            log::info!(
                "index {name} built on {} ({} keys, {} ms)",
                self.name(),
                idx.stats.keys,
                idx.stats.build_time_ms
            );
        }
        Ok(name)
    }

    /// Mongo-style `createIndex({author: 1, published_year: -1})`.
    ///
    /// # Errors
    /// `QueryError` for a malformed key document, otherwise as [`Collection::declare_index`].
    pub fn create_index(&self, keys: &BsonDocument) -> DbResult<String> {
        self.declare_index(IndexSpec::from_bson(keys)?)
    }

    pub fn drop_index(&self, name: &str) -> bool {
        let dropped = self.write().indexes.drop_index(name);
        if dropped {
            log::info!("index {name} dropped from {}", self.name());
        }
        dropped
    }

    #[must_use]
    pub fn index_descriptors(&self) -> Vec<IndexDescriptor> {
        self.read().indexes.descriptors()
    }

    #[must_use]
    pub fn plan_for(&self, filter: &Filter, sort: Option<&[SortSpec]>) -> QueryPlan {
        self.read().indexes.plan_for(filter, sort)
    }

    /// Whether any index still references the document `id`.
    #[must_use]
    pub fn is_indexed(&self, id: &DocumentId) -> bool {
        self.read().indexes.contains_id(id)
    }

    /// True when every index holds exactly what a rebuild from the current
    /// documents would.
    #[must_use]
    pub fn indexes_consistent(&self) -> bool {
        let st = self.read();
        st.indexes.descriptors().into_iter().all(|d| {
            let mut fresh = BTreeIndex::new(d.spec);
            for (r, data) in st.slot_docs() {
                fresh.insert(data, r);
            }
            st.indexes.get(&d.name).is_some_and(|idx| idx.dump() == fresh.dump())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DbError;
    use crate::query::Order;
    use bson::doc;

    #[test]
    fn create_index_builds_from_existing_documents() {
        let col = Collection::new("books");
        col.insert_document(doc! {"author": "Orwell", "published_year": 1949}).unwrap();
        col.insert_document(doc! {"author": "Austen", "published_year": 1813}).unwrap();
        let name = col.create_index(&doc! {"author": 1, "published_year": -1}).unwrap();
        assert_eq!(name, "author_1_published_year_-1");
        let d = &col.index_descriptors()[0];
        assert_eq!(d.entries, 2);
        assert!(col.indexes_consistent());
        assert!(col.drop_index(&name));
        assert!(!col.drop_index(&name));
    }

    #[test]
    fn unique_build_over_duplicates_is_not_registered() {
        let col = Collection::new("books");
        col.insert_many(vec![doc! {"title": "A"}, doc! {"title": "A"}]).unwrap();
        let err = col.declare_index(IndexSpec::single("title", Order::Asc).unique()).unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));
        assert!(col.index_descriptors().is_empty());
    }
}
