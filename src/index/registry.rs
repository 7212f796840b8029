use super::btree::{BTreeIndex, ScanBounds};
use super::descriptor::{IndexDescriptor, IndexSpec};
use super::key::{DocRef, KeyValue};
use super::plan::{CostClass, QueryPlan};
use crate::errors::{DbError, DbResult};
use crate::query::{CmpOp, Filter, SortSpec};
use crate::types::DocumentId;
use bson::Document as BsonDocument;
use std::collections::HashMap;
use std::ops::Bound;

/// All indexes declared on one collection, in declaration order.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: Vec<BTreeIndex>,
}

impl IndexRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: Vec::new() }
    }

    /// Register `spec` and build it from `docs`. Returns the index name and
    /// whether a new index was created; an identical declaration is a no-op.
    ///
    /// # Errors
    /// `IndexConflict` when an index on the same fields differs in direction or
    /// uniqueness; `DuplicateKey` when a unique index can't be built. The
    /// registry is unchanged on error.
    pub fn declare<'a, I>(&mut self, spec: IndexSpec, docs: I) -> DbResult<(String, bool)>
    where
        I: IntoIterator<Item = (DocRef, &'a BsonDocument)>,
    {
        if spec.fields.is_empty() {
            return Err(DbError::QueryError("index needs at least one field".into()));
        }
        if let Some(existing) = self.indexes.iter().find(|i| i.spec.same_paths(&spec)) {
            if existing.spec == spec {
                return Ok((existing.name.clone(), false));
            }
            return Err(DbError::IndexConflict(format!(
                "index {} already covers these fields with a different definition than {}",
                existing.name,
                spec.name()
            )));
        }
        let start = std::time::Instant::now();
        let mut idx = BTreeIndex::new(spec);
        for (r, doc) in docs {
            let key = idx.key_of(doc);
            idx.check_unique(&key, &r.id)?;
            idx.insert(doc, r);
        }
        idx.stats.build_time_ms = start.elapsed().as_millis();
        let name = idx.name.clone();
        self.indexes.push(idx);
        Ok((name, true))
    }

    pub fn drop_index(&mut self, name: &str) -> bool {
        let before = self.indexes.len();
        self.indexes.retain(|i| i.name != name);
        self.indexes.len() != before
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BTreeIndex> {
        self.indexes.iter().find(|i| i.name == name)
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.indexes.iter().map(BTreeIndex::descriptor).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Verify `doc` (owned by `owner`) can be stored without violating any
    /// unique index. Nothing is modified.
    ///
    /// # Errors
    /// `DuplicateKey` naming the first violated index.
    pub fn check_insert(&self, doc: &BsonDocument, owner: &DocumentId) -> DbResult<()> {
        for idx in &self.indexes {
            idx.check_unique(&idx.key_of(doc), owner)?;
        }
        Ok(())
    }

    pub fn insert_all(&mut self, doc: &BsonDocument, r: &DocRef) {
        for idx in &mut self.indexes {
            idx.insert(doc, r.clone());
        }
    }

    pub fn remove_all(&mut self, doc: &BsonDocument, r: &DocRef) {
        for idx in &mut self.indexes {
            idx.remove(doc, r);
        }
    }

    /// Re-key `r` in the indexes whose key actually changed between `old` and `new`.
    pub fn replace_all(&mut self, old: &BsonDocument, new: &BsonDocument, r: &DocRef) {
        for idx in &mut self.indexes {
            if idx.key_of(old) != idx.key_of(new) {
                idx.remove(old, r);
                idx.insert(new, r.clone());
            }
        }
    }

    #[must_use]
    pub fn contains_id(&self, id: &DocumentId) -> bool {
        self.indexes.iter().any(|i| i.contains_id(id))
    }

    /// Choose how to serve `filter` (and optionally `sort`).
    ///
    /// Each index consumes equality conjuncts on its leading fields, then at
    /// most one range on the next field; the index consuming the most fields
    /// wins, earlier declarations breaking ties. Without a predicate match the
    /// plan stays a full scan, flagged `sort_covered` when some index's field
    /// order matches the sort.
    #[must_use]
    pub fn plan_for(&self, filter: &Filter, sort: Option<&[SortSpec]>) -> QueryPlan {
        let leaves = Leaves::collect(filter);
        let mut best: Option<(&BTreeIndex, ScanBounds)> = None;
        for idx in &self.indexes {
            let bounds = leaves.bounds_for(idx);
            let used = bounds.fields_used();
            if used > 0 && best.as_ref().is_none_or(|(_, b)| used > b.fields_used()) {
                best = Some((idx, bounds));
            }
        }

        let sort = sort.filter(|s| !s.is_empty());
        if let Some((idx, bounds)) = best {
            let key_fields = idx.spec.fields.iter().take(bounds.fields_used()).map(|f| f.path.clone()).collect();
            let sort_covered = sort.is_some_and(|s| covers_sort(idx, bounds.eq.len(), s));
            log::debug!("plan: index {} serves {:?}", idx.name, key_fields);
            return QueryPlan {
                index: Some(idx.name.clone()),
                key_fields,
                bounds: Some(bounds),
                sort_covered,
                cost: CostClass::Indexed,
            };
        }
        if let Some(s) = sort
            && let Some(idx) = self.indexes.iter().find(|i| covers_sort(i, 0, s))
        {
            log::debug!("plan: index {} matches sort order, scanning all documents", idx.name);
            return QueryPlan { sort_covered: true, ..QueryPlan::full_scan() };
        }
        QueryPlan::full_scan()
    }

    /// Candidate references for a plan with scan bounds, in insertion order,
    /// plus the number of keys examined.
    #[must_use]
    pub fn candidates(&self, plan: &QueryPlan) -> Option<(Vec<DocRef>, usize)> {
        let bounds = plan.bounds.as_ref()?;
        let idx = self.get(plan.index.as_deref()?)?;
        Some(idx.scan(bounds))
    }
}

/// Sort keys must line up with index fields starting at some offset within
/// the equality prefix, with directions all equal to or all inverted from the
/// declaration.
fn covers_sort(idx: &BTreeIndex, eq_len: usize, sort: &[SortSpec]) -> bool {
    let fields = &idx.spec.fields;
    (0..=eq_len).any(|offset| {
        let Some(window) = fields.get(offset..offset + sort.len()) else {
            return false;
        };
        let paths_match = window.iter().zip(sort).all(|(f, s)| f.path == s.field);
        let same = window.iter().zip(sort).all(|(f, s)| f.order == s.order);
        let inverted = window.iter().zip(sort).all(|(f, s)| f.order == s.order.reversed());
        paths_match && (same || inverted)
    })
}

/// Indexable conjuncts of a filter: equality literals and merged ranges by path.
#[derive(Default)]
struct Leaves {
    eq: HashMap<String, KeyValue>,
    range: HashMap<String, (Bound<KeyValue>, Bound<KeyValue>)>,
}

impl Leaves {
    fn collect(filter: &Filter) -> Self {
        let mut out = Self::default();
        for leaf in filter.conjuncts() {
            let Filter::Cmp { path, op, value } = leaf else { continue };
            let Some(key) = KeyValue::scalar(value) else { continue };
            if !op.is_range() {
                out.eq.entry(path.clone()).or_insert(key);
                continue;
            }
            let entry = out.range.entry(path.clone()).or_insert((Bound::Unbounded, Bound::Unbounded));
            match op {
                CmpOp::Gt => entry.0 = tighter_lower(&entry.0, Bound::Excluded(key)),
                CmpOp::Gte => entry.0 = tighter_lower(&entry.0, Bound::Included(key)),
                CmpOp::Lt => entry.1 = tighter_upper(&entry.1, Bound::Excluded(key)),
                CmpOp::Lte => entry.1 = tighter_upper(&entry.1, Bound::Included(key)),
                CmpOp::Eq => {}
            }
        }
        // A range whose two ends disagree on type can't be scanned as one interval.
        out.range.retain(|_, (lo, hi)| match (bound_value(lo), bound_value(hi)) {
            (Some(a), Some(b)) => a.class() == b.class(),
            _ => true,
        });
        out
    }

    fn bounds_for(&self, idx: &BTreeIndex) -> ScanBounds {
        let mut eq = Vec::new();
        let mut range = None;
        for field in &idx.spec.fields {
            if let Some(v) = self.eq.get(&field.path) {
                eq.push(v.clone());
                continue;
            }
            range = self.range.get(&field.path).cloned();
            break;
        }
        ScanBounds { eq, range }
    }
}

const fn bound_value(b: &Bound<KeyValue>) -> Option<&KeyValue> {
    match b {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

fn tighter_lower(cur: &Bound<KeyValue>, new: Bound<KeyValue>) -> Bound<KeyValue> {
    match (bound_value(cur), bound_value(&new)) {
        (None, _) => new,
        (Some(a), Some(b)) if b.class() == a.class() && (b > a || (b == a && matches!(new, Bound::Excluded(_)))) => new,
        _ => cur.clone(),
    }
}

fn tighter_upper(cur: &Bound<KeyValue>, new: Bound<KeyValue>) -> Bound<KeyValue> {
    match (bound_value(cur), bound_value(&new)) {
        (None, _) => new,
        (Some(a), Some(b)) if b.class() == a.class() && (b < a || (b == a && matches!(new, Bound::Excluded(_)))) => new,
        _ => cur.clone(),
    }
}
