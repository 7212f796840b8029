use super::expr::eval_expr;
use super::types::{Accumulator, GroupSpec, ProjectField, Stage};
use crate::collection::Collection;
use crate::document::{TypeClass, as_f64, compare_bson, get_path, insert_path};
use crate::errors::{DbError, DbResult};
use crate::index::KeyValue;
use crate::query::exec::candidates;
use crate::query::{SortSpec, compare_docs, eval_filter, matches};
use crate::types::ID_FIELD;
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::time::Instant;

/// Run `stages` in order over the collection's records (insertion order),
/// read under one snapshot.
///
/// # Errors
/// `InvalidPredicate` from a `Match`, `InvalidExpression` from a `Project`
/// or `Group`, `InvalidPipeline` when a stage exceeds the configured limits.
pub fn run(col: &Collection, stages: &[Stage]) -> DbResult<Vec<BsonDocument>> {
    let start = Instant::now();
    for stage in stages {
        if let Stage::Sort(keys) = stage
            && keys.len() > col.limits().max_sort_fields
        {
            return Err(DbError::InvalidPipeline(format!("$sort has {} keys", keys.len())));
        }
    }

    // A leading match is served like a find: type-checked against the
    // collection profile, then narrowed through an index when one applies.
    let (mut records, rest, indexed) = {
        let st = col.read();
        match stages.split_first() {
            Some((Stage::Match(filter), rest)) => {
                st.profile.check(filter)?;
                let plan = st.indexes.plan_for(filter, None);
                let (cands, _) = candidates(&st, &plan);
                let recs: Vec<BsonDocument> =
                    cands.into_iter().filter(|(_, d)| matches(&d.data, filter)).map(|(_, d)| d.to_record()).collect();
                (recs, rest, plan.used_index())
            }
            _ => (st.iter().map(crate::document::Document::to_record).collect(), stages, false),
        }
    };

    for stage in rest {
        records = apply_stage(stage, records)?;
    }

    col.stats.aggregations_total.fetch_add(1, AtomicOrdering::Relaxed);
    crate::query::telemetry::log_query(
        &col.stats,
        col.name(),
        "aggregate",
        start.elapsed(),
        indexed,
        col.limits().slow_query_ms,
    );
    crate::devlog!(
        "{{\"bench\":\"aggregate\",\"collection\":\"{}\",\"stages\":{},\"duration_us\":{},\"result_count\":{}}}",
        col.name(),
        stages.len(),
        start.elapsed().as_micros(),
        records.len()
    );
    Ok(records)
}

/// Alias of [`run`].
///
/// # Errors
/// See [`run`].
pub fn aggregate(col: &Collection, stages: &[Stage]) -> DbResult<Vec<BsonDocument>> {
    run(col, stages)
}

/// Apply one stage to an in-memory record sequence.
///
/// # Errors
/// See [`run`].
pub fn apply_stage(stage: &Stage, mut records: Vec<BsonDocument>) -> DbResult<Vec<BsonDocument>> {
    match stage {
        Stage::Match(filter) => {
            let mut out = Vec::with_capacity(records.len());
            for r in records {
                if eval_filter(&r, filter)? {
                    out.push(r);
                }
            }
            Ok(out)
        }
        Stage::Project(fields) => records.iter().map(|r| project(r, fields)).collect(),
        Stage::Group(spec) => group(&records, spec),
        Stage::Sort(keys) => {
            sort_records(&mut records, keys);
            Ok(records)
        }
        Stage::Limit(n) => {
            records.truncate(*n);
            Ok(records)
        }
        Stage::Skip(n) => Ok(records.into_iter().skip(*n).collect()),
    }
}

fn sort_records(records: &mut [BsonDocument], keys: &[SortSpec]) {
    records.sort_by(|a, b| compare_docs(a, b, keys));
}

fn project(record: &BsonDocument, fields: &[(String, ProjectField)]) -> DbResult<BsonDocument> {
    let mut out = BsonDocument::new();
    for (name, field) in fields {
        match field {
            ProjectField::Include => {
                if let Some(v) = get_path(record, name) {
                    insert_path(&mut out, name, v.clone());
                }
            }
            ProjectField::Computed(expr) => insert_path(&mut out, name, eval_expr(expr, record)?),
        }
    }
    Ok(out)
}

/// Running state of one accumulator within one group.
enum AccState {
    Count(i64),
    Sum { int: i64, float: f64, integral: bool },
    Avg { sum: f64, n: u64 },
    Pick(Option<Bson>),
    Last(Bson),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Count => Self::Count(0),
            Accumulator::Sum(_) => Self::Sum { int: 0, float: 0.0, integral: true },
            Accumulator::Avg(_) => Self::Avg { sum: 0.0, n: 0 },
            Accumulator::Min(_) | Accumulator::Max(_) | Accumulator::First(_) => Self::Pick(None),
            Accumulator::Last(_) => Self::Last(Bson::Null),
        }
    }

    fn feed(&mut self, acc: &Accumulator, record: &BsonDocument) -> DbResult<()> {
        match (self, acc) {
            (Self::Count(n), _) => *n += 1,
            (Self::Sum { int, float, integral }, Accumulator::Sum(e)) => match eval_expr(e, record)? {
                Bson::Int32(i) => add_int(int, float, integral, i64::from(i)),
                Bson::Int64(i) => add_int(int, float, integral, i),
                other => {
                    if let Some(f) = as_f64(&other) {
                        *float += f;
                        *integral = false;
                    }
                }
            },
            (Self::Avg { sum, n }, Accumulator::Avg(e)) => {
                if let Some(f) = as_f64(&eval_expr(e, record)?) {
                    *sum += f;
                    *n += 1;
                }
            }
            (Self::Pick(cur), Accumulator::Min(e) | Accumulator::Max(e)) => {
                let v = eval_expr(e, record)?;
                if TypeClass::of(&v) == TypeClass::Null {
                    return Ok(());
                }
                let want = if matches!(acc, Accumulator::Min(_)) { Ordering::Less } else { Ordering::Greater };
                if cur.as_ref().is_none_or(|c| compare_bson(&v, c) == want) {
                    *cur = Some(v);
                }
            }
            (Self::Pick(cur), Accumulator::First(e)) => {
                if cur.is_none() {
                    *cur = Some(eval_expr(e, record)?);
                }
            }
            (Self::Last(cur), Accumulator::Last(e)) => *cur = eval_expr(e, record)?,
            _ => {}
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Bson {
        match self {
            Self::Count(n) => Bson::Int64(n),
            Self::Sum { int, float, integral } => {
                if integral {
                    Bson::Int64(int)
                } else {
                    Bson::Double(float + int as f64)
                }
            }
            Self::Avg { sum, n } => {
                if n == 0 {
                    Bson::Null
                } else {
                    Bson::Double(sum / n as f64)
                }
            }
            Self::Pick(v) => v.unwrap_or(Bson::Null),
            Self::Last(v) => v,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn add_int(int: &mut i64, float: &mut f64, integral: &mut bool, i: i64) {
    match int.checked_add(i) {
        Some(s) => *int = s,
        None => {
            *float += i as f64;
            *integral = false;
        }
    }
}

struct Bucket {
    key: Bson,
    states: Vec<AccState>,
}

fn group(records: &[BsonDocument], spec: &GroupSpec) -> DbResult<Vec<BsonDocument>> {
    let mut slots: HashMap<KeyValue, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();
    for r in records {
        let key = eval_expr(&spec.id, r)?;
        let class = TypeClass::of(&key);
        if class != TypeClass::Null && !class.is_scalar() {
            return Err(DbError::InvalidExpression(format!("group key must be a scalar, got a {}", class.name())));
        }
        let kv = KeyValue::from_bson(Some(&key));
        let at = *slots.entry(kv).or_insert_with(|| {
            let key = if class == TypeClass::Null { Bson::Null } else { key.clone() };
            buckets.push(Bucket { key, states: spec.accumulators.iter().map(|(_, a)| AccState::new(a)).collect() });
            buckets.len() - 1
        });
        let bucket = &mut buckets[at];
        for (state, (_, acc)) in bucket.states.iter_mut().zip(&spec.accumulators) {
            state.feed(acc, r)?;
        }
    }
    Ok(buckets
        .into_iter()
        .map(|b| {
            let mut out = BsonDocument::new();
            out.insert(ID_FIELD, b.key);
            for (state, (name, _)) in b.states.into_iter().zip(&spec.accumulators) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}
