use crate::document::{TypeClass, flatten_paths};
use crate::errors::DbResult;
use crate::query::Filter;
use crate::query::eval::{check_classes, literal_class, visit_comparisons};
use bson::Document as BsonDocument;
use std::collections::{BTreeMap, HashMap};

/// Count of stored values per dotted path and type class. Lets a predicate be
/// type-checked against the whole collection without touching documents.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldProfile {
    counts: HashMap<String, BTreeMap<TypeClass, usize>>,
}

impl FieldProfile {
    pub fn add(&mut self, doc: &BsonDocument) {
        flatten_paths(doc, &mut |path, v| {
            *self.counts.entry(path.to_string()).or_default().entry(TypeClass::of(v)).or_insert(0) += 1;
        });
    }

    pub fn remove(&mut self, doc: &BsonDocument) {
        flatten_paths(doc, &mut |path, v| {
            let Some(classes) = self.counts.get_mut(path) else { return };
            let class = TypeClass::of(v);
            if let Some(n) = classes.get_mut(&class) {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    classes.remove(&class);
                }
            }
            if classes.is_empty() {
                self.counts.remove(path);
            }
        });
    }

    /// Classes currently stored at `path`, in cross-type order.
    pub fn classes(&self, path: &str) -> impl Iterator<Item = TypeClass> + '_ {
        self.counts.get(path).into_iter().flat_map(|m| m.keys().copied())
    }

    /// Fails exactly when evaluating `filter` against every document would.
    ///
    /// # Errors
    /// `InvalidPredicate` for the first offending comparison in tree order.
    pub fn check(&self, filter: &Filter) -> DbResult<()> {
        visit_comparisons(filter, &mut |path, value| {
            let literal = literal_class(path, value)?;
            self.classes(path).try_for_each(|found| check_classes(path, literal, found))
        })
    }
}
