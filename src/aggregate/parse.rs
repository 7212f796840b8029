use super::types::{Accumulator, Expr, GroupSpec, ProjectField, Stage};
use crate::document::as_f64;
use crate::errors::{DbError, DbResult};
use crate::query::{parse_filter, parse_sort};
use crate::types::ID_FIELD;
use bson::{Bson, Document as BsonDocument};

/// Parse Mongo-style stages such as
/// `[{$group: {_id: "$genre", avg: {$avg: "$price"}}}, {$sort: {avg: -1}}]`.
///
/// # Errors
/// `InvalidPipeline` for unknown or malformed stages, `InvalidExpression`
/// for malformed expressions.
pub fn parse_pipeline(stages: &[BsonDocument]) -> DbResult<Vec<Stage>> {
    stages.iter().map(parse_stage).collect()
}

/// # Errors
/// `Json` for malformed JSON, otherwise as [`parse_pipeline`].
pub fn parse_pipeline_json(json: &str) -> DbResult<Vec<Stage>> {
    let stages: Vec<BsonDocument> = serde_json::from_str(json)?;
    parse_pipeline(&stages)
}

fn pipeline_err(stage: &str, e: &DbError) -> DbError {
    match e {
        DbError::InvalidExpression(_) => DbError::InvalidExpression(e.to_string()),
        other => DbError::InvalidPipeline(format!("{stage}: {other}")),
    }
}

fn parse_stage(doc: &BsonDocument) -> DbResult<Stage> {
    let mut entries = doc.iter();
    let (Some((name, body)), None) = (entries.next(), entries.next()) else {
        return Err(DbError::InvalidPipeline("each stage must have exactly one key".into()));
    };
    let as_doc = || match body {
        Bson::Document(d) => Ok(d),
        other => Err(DbError::InvalidPipeline(format!("{name} expects a document, got {other}"))),
    };
    Ok(match name.as_str() {
        "$match" => Stage::Match(parse_filter(as_doc()?).map_err(|e| pipeline_err(name, &e))?),
        "$project" => Stage::Project(parse_project(as_doc()?)?),
        "$group" => Stage::Group(parse_group(as_doc()?)?),
        "$sort" => Stage::Sort(parse_sort(as_doc()?).map_err(|e| pipeline_err(name, &e))?),
        "$limit" => Stage::Limit(count(name, body)?),
        "$skip" => Stage::Skip(count(name, body)?),
        other => return Err(DbError::InvalidPipeline(format!("unsupported stage '{other}'"))),
    })
}

fn count(stage: &str, v: &Bson) -> DbResult<usize> {
    let n = match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.fract() == 0.0 => *f as i64,
        other => return Err(DbError::InvalidPipeline(format!("{stage} expects an integer, got {other}"))),
    };
    usize::try_from(n).map_err(|_| DbError::InvalidPipeline(format!("{stage} must not be negative, got {n}")))
}

fn parse_project(doc: &BsonDocument) -> DbResult<Vec<(String, ProjectField)>> {
    let mut fields = Vec::with_capacity(doc.len());
    for (name, spec) in doc {
        let flag = match spec {
            Bson::Boolean(b) => Some(*b),
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => as_f64(spec).map(|f| f != 0.0),
            _ => None,
        };
        match flag {
            Some(true) => fields.push((name.clone(), ProjectField::Include)),
            // `_id: 0` is the only exclusion; leaving it unlisted drops it.
            Some(false) if name == ID_FIELD => {}
            Some(false) => {
                return Err(DbError::InvalidPipeline(format!(
                    "$project can only exclude '{ID_FIELD}', not '{name}'"
                )));
            }
            None => fields.push((name.clone(), ProjectField::Computed(parse_expr(spec)?))),
        }
    }
    Ok(fields)
}

fn parse_group(doc: &BsonDocument) -> DbResult<GroupSpec> {
    let Some(id) = doc.get(ID_FIELD) else {
        return Err(DbError::InvalidPipeline(format!("$group needs an '{ID_FIELD}' expression")));
    };
    let id = parse_expr(id)?;
    let mut accumulators = Vec::new();
    for (name, spec) in doc {
        if name == ID_FIELD {
            continue;
        }
        let Bson::Document(op_doc) = spec else {
            return Err(DbError::InvalidPipeline(format!("accumulator '{name}' must be a document")));
        };
        let mut ops = op_doc.iter();
        let (Some((op, arg)), None) = (ops.next(), ops.next()) else {
            return Err(DbError::InvalidPipeline(format!("accumulator '{name}' must name one operator")));
        };
        let acc = match op.as_str() {
            "$count" => Accumulator::Count,
            "$sum" if matches!(arg, Bson::Int32(1) | Bson::Int64(1)) => Accumulator::Count,
            "$sum" => Accumulator::Sum(parse_expr(arg)?),
            "$avg" => Accumulator::Avg(parse_expr(arg)?),
            "$min" => Accumulator::Min(parse_expr(arg)?),
            "$max" => Accumulator::Max(parse_expr(arg)?),
            "$first" => Accumulator::First(parse_expr(arg)?),
            "$last" => Accumulator::Last(parse_expr(arg)?),
            other => return Err(DbError::InvalidPipeline(format!("unsupported accumulator '{other}'"))),
        };
        accumulators.push((name.clone(), acc));
    }
    Ok(GroupSpec { id, accumulators })
}

/// Parse an aggregation expression: `"$field"`, an operator document such
/// as `{$subtract: ["$a", "$b"]}`, or a literal.
///
/// # Errors
/// `InvalidExpression` for unknown operators or wrong operand counts.
pub fn parse_expr(v: &Bson) -> DbResult<Expr> {
    match v {
        Bson::String(s) if s.starts_with('$') => {
            let path = &s[1..];
            if path.is_empty() {
                return Err(DbError::InvalidExpression("empty field reference".into()));
            }
            Ok(Expr::Field(path.to_string()))
        }
        Bson::Document(d) if d.len() == 1 && d.keys().all(|k| k.starts_with('$')) => {
            let Some((op, arg)) = d.iter().next() else {
                return Err(DbError::InvalidExpression("empty operator document".into()));
            };
            parse_operator(op, arg)
        }
        Bson::Document(_) | Bson::Array(_) => {
            Err(DbError::InvalidExpression(format!("unsupported expression {v}")))
        }
        literal => Ok(Expr::Literal(literal.clone())),
    }
}

fn args(op: &str, arg: &Bson) -> DbResult<Vec<Expr>> {
    match arg {
        Bson::Array(items) => items.iter().map(parse_expr).collect(),
        single => Ok(vec![parse_expr(single).map_err(|e| DbError::InvalidExpression(format!("{op}: {e}")))?]),
    }
}

fn pair(op: &str, arg: &Bson) -> DbResult<(Box<Expr>, Box<Expr>)> {
    let mut v = args(op, arg)?;
    if v.len() != 2 {
        return Err(DbError::InvalidExpression(format!("{op} takes exactly two operands, got {}", v.len())));
    }
    let b = v.pop();
    let a = v.pop();
    match (a, b) {
        (Some(a), Some(b)) => Ok((Box::new(a), Box::new(b))),
        _ => Err(DbError::InvalidExpression(format!("{op} takes exactly two operands"))),
    }
}

fn parse_operator(op: &str, arg: &Bson) -> DbResult<Expr> {
    Ok(match op {
        "$literal" => Expr::Literal(arg.clone()),
        "$add" => Expr::Add(args(op, arg)?),
        "$multiply" => Expr::Multiply(args(op, arg)?),
        "$concat" => Expr::Concat(args(op, arg)?),
        "$subtract" => {
            let (a, b) = pair(op, arg)?;
            Expr::Subtract(a, b)
        }
        "$divide" => {
            let (a, b) = pair(op, arg)?;
            Expr::Divide(a, b)
        }
        "$mod" => {
            let (a, b) = pair(op, arg)?;
            Expr::Mod(a, b)
        }
        "$toString" => {
            let mut v = args(op, arg)?;
            match (v.pop(), v.is_empty()) {
                (Some(e), true) => Expr::ToString(Box::new(e)),
                _ => return Err(DbError::InvalidExpression("$toString takes one operand".into())),
            }
        }
        other => return Err(DbError::InvalidExpression(format!("unsupported operator '{other}'"))),
    })
}
