use super::descriptor::{IndexDescriptor, IndexSpec};
use super::key::{DocRef, IndexKey, KeyValue, display_key, key_for};
use crate::errors::{DbError, DbResult};
use crate::types::DocumentId;
use bson::Document as BsonDocument;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Bounds for one index scan: equality on a leading run of fields, then an
/// optional range on the next field.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBounds {
    pub eq: Vec<KeyValue>,
    pub range: Option<(Bound<KeyValue>, Bound<KeyValue>)>,
}

impl ScanBounds {
    #[must_use]
    pub fn fields_used(&self) -> usize {
        self.eq.len() + usize::from(self.range.is_some())
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub build_time_ms: u128,
}

/// Ordered index over one or more fields. Key parts are stored ascending;
/// declared directions only matter when deciding whether a sort can be served.
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    pub name: String,
    pub spec: IndexSpec,
    paths: Vec<String>,
    map: BTreeMap<IndexKey, BTreeSet<DocRef>>,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self { name: spec.name(), paths: spec.paths(), spec, map: BTreeMap::new(), stats: IndexStats::default() }
    }

    #[must_use]
    pub fn key_of(&self, doc: &BsonDocument) -> IndexKey {
        key_for(doc, &self.paths)
    }

    /// Unique indexes reject a key already held by another document. Keys made
    /// only of missing values are exempt.
    ///
    /// # Errors
    /// `DuplicateKey` when the key is taken.
    pub fn check_unique(&self, key: &IndexKey, owner: &DocumentId) -> DbResult<()> {
        if !self.spec.unique || key.iter().all(|k| *k == KeyValue::Missing) {
            return Ok(());
        }
        match self.map.get(key) {
            Some(refs) if refs.iter().any(|r| r.id != *owner) => {
                Err(DbError::DuplicateKey { index: self.name.clone(), key: display_key(key) })
            }
            _ => Ok(()),
        }
    }

    pub fn insert(&mut self, doc: &BsonDocument, r: DocRef) {
        let key = self.key_of(doc);
        if self.map.entry(key).or_default().insert(r) {
            self.stats.entries += 1;
        }
        self.stats.keys = self.map.len();
    }

    pub fn remove(&mut self, doc: &BsonDocument, r: &DocRef) {
        let key = self.key_of(doc);
        if let Some(set) = self.map.get_mut(&key) {
            if set.remove(r) {
                self.stats.entries = self.stats.entries.saturating_sub(1);
            }
            if set.is_empty() {
                self.map.remove(&key);
            }
        }
        self.stats.keys = self.map.len();
    }

    /// Collect references within `bounds`, in insertion order, together with
    /// the number of distinct keys examined.
    #[must_use]
    pub fn scan(&self, bounds: &ScanBounds) -> (Vec<DocRef>, usize) {
        let prefix = &bounds.eq;
        let n = prefix.len();
        let mut start: IndexKey = prefix.clone();
        if let Some((Bound::Included(v) | Bound::Excluded(v), _)) = &bounds.range {
            start.push(v.clone());
        }
        let range_class = bounds.range.as_ref().and_then(|(lo, hi)| match (lo, hi) {
            (Bound::Included(v) | Bound::Excluded(v), _) | (_, Bound::Included(v) | Bound::Excluded(v)) => {
                Some(v.class())
            }
            _ => None,
        });

        let mut out = Vec::new();
        let mut examined = 0usize;
        for (key, refs) in self.map.range(start..) {
            if key.len() < n || key[..n] != prefix[..] {
                break;
            }
            if let (Some((lo, hi)), Some(class)) = (&bounds.range, range_class) {
                let part = &key[n];
                if part.class() < class {
                    continue;
                }
                if part.class() > class {
                    break;
                }
                if matches!(lo, Bound::Excluded(v) if part == v) {
                    continue;
                }
                let above = match hi {
                    Bound::Included(v) => part > v,
                    Bound::Excluded(v) => part >= v,
                    Bound::Unbounded => false,
                };
                if above {
                    break;
                }
            }
            examined += 1;
            out.extend(refs.iter().cloned());
        }
        out.sort_unstable();
        (out, examined)
    }

    #[must_use]
    pub fn contains_id(&self, id: &DocumentId) -> bool {
        self.map.values().any(|set| set.iter().any(|r| r.id == *id))
    }

    #[must_use]
    pub fn entries(&self) -> usize {
        self.stats.entries
    }

    /// Every (key, reference) pair in key order.
    #[must_use]
    pub fn dump(&self) -> Vec<(IndexKey, DocRef)> {
        self.map
            .iter()
            .flat_map(|(k, set)| set.iter().map(move |r| (k.clone(), r.clone())))
            .collect()
    }

    #[must_use]
    pub fn descriptor(&self) -> IndexDescriptor {
        IndexDescriptor {
            name: self.name.clone(),
            spec: self.spec.clone(),
            keys: self.map.len(),
            entries: self.stats.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Order;
    use bson::doc;
    use crate::document::Number;

    fn num(f: f64) -> KeyValue {
        KeyValue::Num(Number::float(f))
    }

    fn build(docs: &[BsonDocument], spec: IndexSpec) -> (BTreeIndex, Vec<DocRef>) {
        let mut idx = BTreeIndex::new(spec);
        let mut refs = Vec::new();
        for (i, d) in docs.iter().enumerate() {
            let r = DocRef { slot: i as u64, id: DocumentId::new() };
            idx.insert(d, r.clone());
            refs.push(r);
        }
        (idx, refs)
    }

    #[test]
    fn range_scan_respects_exclusive_bounds_and_class() {
        let docs: Vec<BsonDocument> = (0..10).map(|i| doc! {"k": i}).chain([doc! {"k": "str"}, doc! {}]).collect();
        let (idx, refs) = build(&docs, IndexSpec::single("k", Order::Asc));
        let (hits, examined) = idx.scan(&ScanBounds {
            eq: vec![],
            range: Some((Bound::Excluded(num(3.0)), Bound::Included(num(6.0)))),
        });
        assert_eq!(hits, refs[4..=6].to_vec());
        assert_eq!(examined, 3);

        let (hits, _) = idx.scan(&ScanBounds { eq: vec![], range: Some((Bound::Excluded(num(7.0)), Bound::Unbounded)) });
        assert_eq!(hits, refs[8..=9].to_vec());

        let (hits, _) = idx.scan(&ScanBounds { eq: vec![], range: Some((Bound::Unbounded, Bound::Excluded(num(2.0)))) });
        assert_eq!(hits, refs[0..2].to_vec());
    }

    #[test]
    fn compound_prefix_then_range() {
        let docs = vec![
            doc! {"author": "Orwell", "year": 1949},
            doc! {"author": "Austen", "year": 1813},
            doc! {"author": "Orwell", "year": 1945},
            doc! {"author": "Orwell"},
        ];
        let spec = IndexSpec::compound([("author", Order::Asc), ("year", Order::Desc)]);
        let (idx, refs) = build(&docs, spec);
        let (hits, _) = idx.scan(&ScanBounds { eq: vec![KeyValue::Str("Orwell".into())], range: None });
        assert_eq!(hits, vec![refs[0].clone(), refs[2].clone(), refs[3].clone()]);
        let (hits, _) = idx.scan(&ScanBounds {
            eq: vec![KeyValue::Str("Orwell".into())],
            range: Some((Bound::Included(num(1946.0)), Bound::Unbounded)),
        });
        assert_eq!(hits, vec![refs[0].clone()]);
    }

    #[test]
    fn unique_check_ignores_owner_and_missing_keys() {
        let docs = vec![doc! {"title": "A"}, doc! {}];
        let (idx, refs) = build(&docs, IndexSpec::single("title", Order::Asc).unique());
        let key = idx.key_of(&doc! {"title": "A"});
        assert!(idx.check_unique(&key, &refs[0].id).is_ok());
        assert!(matches!(idx.check_unique(&key, &DocumentId::new()), Err(DbError::DuplicateKey { .. })));
        let missing = idx.key_of(&doc! {});
        assert!(idx.check_unique(&missing, &DocumentId::new()).is_ok());
    }

    #[test]
    fn remove_drops_empty_keys() {
        let docs = vec![doc! {"k": 1}];
        let (mut idx, refs) = build(&docs, IndexSpec::single("k", Order::Asc));
        idx.remove(&docs[0], &refs[0]);
        assert_eq!(idx.entries(), 0);
        assert!(idx.dump().is_empty());
        assert!(!idx.contains_id(&refs[0].id));
    }
}
