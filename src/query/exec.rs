use crate::collection::{Collection, CollectionState};
use crate::config::QueryLimits;
use crate::document::{Document, TypeClass, as_f64};
use crate::errors::{DbError, DbResult};
use crate::index::QueryPlan;
use crate::types::ID_FIELD;
use bson::{Bson, Document as BsonDocument};
use std::time::Instant;

use super::cursor::Cursor;
use super::eval::{compare_docs, matches, project_record};
use super::telemetry;
use super::types::{DeleteReport, Filter, FindOptions, UpdateDoc, UpdateReport};

/// Outcome of one read, shared by `find_docs` and `explain`.
pub(crate) struct FindRun {
    pub records: Vec<BsonDocument>,
    pub plan: QueryPlan,
    pub keys_examined: usize,
    pub scanned: usize,
}

/// Candidate documents for `plan` in insertion order, with keys examined.
pub(crate) fn candidates<'a>(st: &'a CollectionState, plan: &QueryPlan) -> (Vec<(u64, &'a Document)>, usize) {
    match st.indexes.candidates(plan) {
        Some((refs, keys)) => (refs.iter().filter_map(|r| st.docs.get(&r.slot).map(|d| (r.slot, d))).collect(), keys),
        None => (st.docs.iter().map(|(s, d)| (*s, d)).collect(), 0),
    }
}

fn check_options(opts: &FindOptions, limits: &QueryLimits) -> DbResult<()> {
    if let Some(sort) = &opts.sort
        && sort.len() > limits.max_sort_fields
    {
        return Err(DbError::QueryError(format!(
            "sort has {} keys, at most {} allowed",
            sort.len(),
            limits.max_sort_fields
        )));
    }
    if let Some(p) = &opts.projection
        && p.fields.len() > limits.max_projection_fields
    {
        return Err(DbError::QueryError(format!(
            "projection lists {} fields, at most {} allowed",
            p.fields.len(),
            limits.max_projection_fields
        )));
    }
    Ok(())
}

/// Only a caller-supplied limit is clamped; no limit returns every match.
fn effective_limit(requested: Option<usize>, limits: &QueryLimits) -> usize {
    match requested {
        Some(n) if n > limits.max_limit => {
            log::warn!("limit {n} clamped to {}", limits.max_limit);
            limits.max_limit
        }
        Some(n) => n,
        None => usize::MAX,
    }
}

pub(crate) fn run_find(st: &CollectionState, filter: &Filter, opts: &FindOptions, limits: &QueryLimits) -> DbResult<FindRun> {
    check_options(opts, limits)?;
    st.profile.check(filter)?;
    let sort = opts.sort.as_deref().filter(|s| !s.is_empty());
    let plan = st.indexes.plan_for(filter, sort);
    let (cands, keys_examined) = candidates(st, &plan);
    let scanned = cands.len();

    let mut records: Vec<BsonDocument> =
        cands.into_iter().filter(|(_, d)| matches(&d.data, filter)).map(|(_, d)| d.to_record()).collect();
    if let Some(sort) = sort {
        records.sort_by(|a, b| compare_docs(a, b, sort));
    }
    let limit = effective_limit(opts.limit, limits);
    let records = records.into_iter().skip(opts.skip.unwrap_or(0)).take(limit);
    let records = match &opts.projection {
        Some(p) => records.map(|r| project_record(&r, p, limits.max_projection_fields)).collect(),
        None => records.collect(),
    };
    Ok(FindRun { records, plan, keys_examined, scanned })
}

/// Run a query: plan, filter, sort (stable, ties in insertion order), skip,
/// limit, then project.
///
/// # Errors
/// `InvalidPredicate` when the filter can't be evaluated against the stored
/// values; `QueryError` when options exceed the configured limits.
pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> DbResult<Cursor> {
    let start = Instant::now();
    let run = {
        let st = col.read();
        run_find(&st, filter, opts, col.limits())?
    };
    let elapsed = start.elapsed();
    telemetry::log_query(&col.stats, col.name(), "find", elapsed, run.plan.used_index(), col.limits().slow_query_ms);
    crate::devlog!(
        "{{\"bench\":\"query\",\"op\":\"find\",\"collection\":\"{}\",\"duration_us\":{},\"used_index\":{},\"scanned\":{},\"result_count\":{}}}",
        col.name(),
        elapsed.as_micros(),
        run.plan.used_index(),
        run.scanned,
        run.records.len()
    );
    Ok(Cursor::new(run.records))
}

/// Number of documents matching `filter`.
///
/// # Errors
/// As [`find_docs`].
pub fn count_docs(col: &Collection, filter: &Filter) -> DbResult<usize> {
    let start = Instant::now();
    let (n, indexed) = {
        let st = col.read();
        st.profile.check(filter)?;
        let plan = st.indexes.plan_for(filter, None);
        let (cands, _) = candidates(&st, &plan);
        (cands.into_iter().filter(|(_, d)| matches(&d.data, filter)).count(), plan.used_index())
    };
    telemetry::log_query(&col.stats, col.name(), "count", start.elapsed(), indexed, col.limits().slow_query_ms);
    crate::devlog!("{{\"bench\":\"query\",\"op\":\"count\",\"collection\":\"{}\",\"result_count\":{}}}", col.name(), n);
    Ok(n)
}

/// Slots of matching documents in insertion order, at most `cap` of them.
fn matching_slots(st: &CollectionState, filter: &Filter, cap: Option<usize>) -> DbResult<Vec<u64>> {
    st.profile.check(filter)?;
    let plan = st.indexes.plan_for(filter, None);
    let (cands, _) = candidates(st, &plan);
    Ok(cands
        .into_iter()
        .filter(|(_, d)| matches(&d.data, filter))
        .map(|(s, _)| s)
        .take(cap.unwrap_or(usize::MAX))
        .collect())
}

fn validate_update(update: &UpdateDoc) -> DbResult<()> {
    if update.is_empty() {
        return Err(DbError::InvalidUpdate("update has no operations".into()));
    }
    let paths = update.set.iter().map(|(p, _)| p).chain(update.inc.iter().map(|(p, _)| p)).chain(&update.unset);
    for p in paths {
        let head = p.split('.').next().unwrap_or_default();
        if head == ID_FIELD {
            return Err(DbError::InvalidUpdate(format!("'{ID_FIELD}' is immutable")));
        }
        if p.split('.').any(|seg| seg.is_empty() || seg.starts_with('$')) {
            return Err(DbError::InvalidUpdate(format!("invalid field path '{p}'")));
        }
    }
    for (p, v) in &update.inc {
        if TypeClass::of(v) != TypeClass::Number {
            return Err(DbError::InvalidUpdate(format!("$inc on '{p}' needs a numeric amount")));
        }
    }
    Ok(())
}

fn parent_mut<'a>(doc: &'a mut BsonDocument, path: &str, create: bool) -> DbResult<Option<(&'a mut BsonDocument, String)>> {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return Ok(None) };
    let mut cur = doc;
    for part in parts {
        if !cur.contains_key(part) {
            if !create {
                return Ok(None);
            }
            cur.insert(part, BsonDocument::new());
        }
        cur = match cur.get_mut(part) {
            Some(Bson::Document(d)) => d,
            Some(_) if create => {
                return Err(DbError::InvalidUpdate(format!("'{part}' in '{path}' is not a document")));
            }
            _ => return Ok(None),
        };
    }
    Ok(Some((cur, last.to_string())))
}

fn add_numbers(path: &str, cur: &Bson, by: &Bson) -> DbResult<Bson> {
    let overflow = || DbError::InvalidUpdate(format!("$inc on '{path}' overflows"));
    Ok(match (cur, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            let a = int_value(cur);
            let b = int_value(by);
            Bson::Int64(a.checked_add(b).ok_or_else(overflow)?)
        }
        _ => match (as_f64(cur), as_f64(by)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => return Err(DbError::InvalidUpdate(format!("$inc on non-numeric field '{path}'"))),
        },
    })
}

fn int_value(v: &Bson) -> i64 {
    match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        _ => 0,
    }
}

/// Apply `update` to `data` in place: `$set`, then `$inc`, then `$unset`.
/// Returns whether anything changed.
///
/// # Errors
/// `InvalidUpdate` for reserved or malformed paths, `$inc` on a non-numeric
/// value, or a path running through a non-document.
pub fn apply_update(data: &mut BsonDocument, update: &UpdateDoc) -> DbResult<bool> {
    validate_update(update)?;
    let before = data.clone();
    for (path, value) in &update.set {
        if let Some((parent, key)) = parent_mut(data, path, true)? {
            parent.insert(key, value.clone());
        }
    }
    for (path, by) in &update.inc {
        if let Some((parent, key)) = parent_mut(data, path, true)? {
            let next = match parent.get(&key) {
                Some(cur) => add_numbers(path, cur, by)?,
                None => by.clone(),
            };
            parent.insert(key, next);
        }
    }
    for path in &update.unset {
        if let Some((parent, key)) = parent_mut(data, path, false)? {
            parent.remove(&key);
        }
    }
    Ok(*data != before)
}

/// Update the first matching document in insertion order.
///
/// # Errors
/// `InvalidPredicate`, `InvalidUpdate` or `DuplicateKey`; the collection is
/// unchanged on error.
pub fn update_one(col: &Collection, filter: &Filter, update: &UpdateDoc) -> DbResult<UpdateReport> {
    update_matching(col, filter, update, Some(1), "update_one")
}

/// Update every matching document as one step: either all are written or none.
///
/// # Errors
/// As [`update_one`].
pub fn update_many(col: &Collection, filter: &Filter, update: &UpdateDoc) -> DbResult<UpdateReport> {
    update_matching(col, filter, update, None, "update_many")
}

fn update_matching(
    col: &Collection,
    filter: &Filter,
    update: &UpdateDoc,
    cap: Option<usize>,
    op: &str,
) -> DbResult<UpdateReport> {
    validate_update(update)?;
    let start = Instant::now();
    let mut st = col.write();
    let slots = matching_slots(&st, filter, cap)?;

    let mut pending = Vec::new();
    for slot in &slots {
        let Some(doc) = st.docs.get(slot) else { continue };
        let mut data = doc.data.clone();
        if apply_update(&mut data, update)? {
            pending.push((*slot, data));
        }
    }

    let mut journal: Vec<(u64, BsonDocument)> = Vec::with_capacity(pending.len());
    for (slot, data) in pending {
        match st.replace(slot, data) {
            Ok(old) => journal.push((slot, old)),
            Err(e) => {
                for (slot, old) in journal.into_iter().rev() {
                    if let Err(undo) = st.replace(slot, old) {
                        log::error!("{op}: rollback of slot {slot} failed: {undo}");
                    }
                }
                return Err(e);
            }
        }
    }
    drop(st);

    let report = UpdateReport { matched: slots.len() as u64, modified: journal.len() as u64 };
    col.stats.record_write(report.modified);
    crate::devlog!(
        "{{\"bench\":\"write\",\"op\":\"{}\",\"collection\":\"{}\",\"duration_us\":{},\"matched\":{},\"modified\":{}}}",
        op,
        col.name(),
        start.elapsed().as_micros(),
        report.matched,
        report.modified
    );
    Ok(report)
}

/// Delete the first matching document in insertion order.
///
/// # Errors
/// `InvalidPredicate`; nothing is deleted on error.
pub fn delete_one(col: &Collection, filter: &Filter) -> DbResult<DeleteReport> {
    delete_matching(col, filter, Some(1), "delete_one")
}

/// Delete every matching document.
///
/// # Errors
/// As [`delete_one`].
pub fn delete_many(col: &Collection, filter: &Filter) -> DbResult<DeleteReport> {
    delete_matching(col, filter, None, "delete_many")
}

fn delete_matching(col: &Collection, filter: &Filter, cap: Option<usize>, op: &str) -> DbResult<DeleteReport> {
    let start = Instant::now();
    let mut st = col.write();
    let slots = matching_slots(&st, filter, cap)?;
    let deleted = slots.into_iter().filter_map(|s| st.remove(s)).count() as u64;
    drop(st);
    col.stats.record_write(deleted);
    crate::devlog!(
        "{{\"bench\":\"write\",\"op\":\"{}\",\"collection\":\"{}\",\"duration_us\":{},\"deleted\":{}}}",
        op,
        col.name(),
        start.elapsed().as_micros(),
        deleted
    );
    Ok(DeleteReport { deleted })
}
