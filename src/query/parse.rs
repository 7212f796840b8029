use crate::errors::{DbError, DbResult};
use bson::{Bson, Document as BsonDocument};

#[cfg(feature = "regex")]
use super::types::Pattern;
use super::types::{CmpOp, Filter, MAX_FILTER_DEPTH, MAX_IN_SET, Order, Projection, SortSpec, UpdateDoc};

// Cap on operator entries taken from one update document
const MAX_UPDATE_FIELDS: usize = 128;

/// Parse a Mongo-style filter document, e.g.
/// `{in_stock: true, published_year: {$gt: 2010}}`.
///
/// # Errors
/// `QueryError` for unknown operators or malformed operands.
pub fn parse_filter(doc: &BsonDocument) -> DbResult<Filter> {
    parse_filter_at(doc, 0)
}

fn parse_filter_at(doc: &BsonDocument, depth: usize) -> DbResult<Filter> {
    if depth > MAX_FILTER_DEPTH {
        return Err(DbError::QueryError(format!("filter nested deeper than {MAX_FILTER_DEPTH}")));
    }
    let mut parts = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        let part = match key.as_str() {
            "$and" => Filter::And(parse_filter_list(key, value, depth)?),
            "$or" => Filter::Or(parse_filter_list(key, value, depth)?),
            "$nor" => Filter::Not(Box::new(Filter::Or(parse_filter_list(key, value, depth)?))),
            k if k.starts_with('$') => {
                return Err(DbError::QueryError(format!("unknown top-level operator '{k}'")));
            }
            path => parse_field(path, value, depth)?,
        };
        parts.push(part);
    }
    Ok(match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    })
}

fn parse_filter_list(op: &str, value: &Bson, depth: usize) -> DbResult<Vec<Filter>> {
    let Bson::Array(items) = value else {
        return Err(DbError::QueryError(format!("{op} expects an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter_at(d, depth + 1),
            other => Err(DbError::QueryError(format!("{op} entries must be documents, got {other}"))),
        })
        .collect()
}

fn is_operator_doc(d: &BsonDocument) -> bool {
    !d.is_empty() && d.keys().all(|k| k.starts_with('$'))
}

fn parse_field(path: &str, value: &Bson, depth: usize) -> DbResult<Filter> {
    let ops = match value {
        Bson::Document(d) if is_operator_doc(d) => d,
        literal => return Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: literal.clone() }),
    };
    #[cfg(feature = "regex")]
    let case_insensitive = matches!(ops.get("$options"), Some(Bson::String(o)) if o.contains('i'));
    let mut parts = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let cmp = |op: CmpOp| Filter::Cmp { path: path.to_string(), op, value: operand.clone() };
        let part = match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$ne" => Filter::Not(Box::new(cmp(CmpOp::Eq))),
            "$in" => Filter::In { path: path.to_string(), values: value_list(op, operand)? },
            "$nin" => Filter::Nin { path: path.to_string(), values: value_list(op, operand)? },
            "$exists" => Filter::Exists { path: path.to_string(), exists: truthy(operand) },
            "$not" => match operand {
                Bson::Document(d) => Filter::Not(Box::new(parse_field(path, &Bson::Document(d.clone()), depth + 1)?)),
                other => return Err(DbError::QueryError(format!("$not expects an operator document, got {other}"))),
            },
            #[cfg(feature = "regex")]
            "$regex" => {
                let (source, flagged) = match operand {
                    Bson::String(p) => (p.as_str(), false),
                    Bson::RegularExpression(re) => (re.pattern.as_str(), re.options.as_str().contains('i')),
                    other => return Err(DbError::QueryError(format!("$regex expects a string, got {other}"))),
                };
                let pattern = Pattern::new(source, case_insensitive || flagged)
                    .map_err(|e| DbError::QueryError(format!("$regex on '{path}': {e}")))?;
                Filter::Regex { path: path.to_string(), pattern }
            }
            #[cfg(feature = "regex")]
            "$options" => continue,
            other => return Err(DbError::QueryError(format!("unknown operator '{other}' on '{path}'"))),
        };
        parts.push(part);
    }
    Ok(if parts.len() == 1 { parts.remove(0) } else { Filter::And(parts) })
}

fn value_list(op: &str, operand: &Bson) -> DbResult<Vec<Bson>> {
    match operand {
        Bson::Array(vals) if vals.len() <= MAX_IN_SET => Ok(vals.clone()),
        Bson::Array(vals) => Err(DbError::QueryError(format!("{op} list has {} values, at most {MAX_IN_SET}", vals.len()))),
        other => Err(DbError::QueryError(format!("{op} expects an array, got {other}"))),
    }
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => crate::document::as_f64(other).is_none_or(|f| f != 0.0),
    }
}

/// Parse a filter from JSON text.
///
/// # Errors
/// `Json` for malformed JSON, otherwise as [`parse_filter`].
pub fn parse_filter_json(json: &str) -> DbResult<Filter> {
    let doc: BsonDocument = serde_json::from_str(json)?;
    parse_filter(&doc)
}

/// Parse `{ $set: {...}, $inc: {...}, $unset: {...} }`.
///
/// # Errors
/// `InvalidUpdate` for unknown operators, non-document operands or a
/// non-numeric `$inc` amount.
pub fn parse_update(doc: &BsonDocument) -> DbResult<UpdateDoc> {
    let mut out = UpdateDoc::default();
    for (op, operand) in doc {
        let Bson::Document(fields) = operand else {
            return Err(DbError::InvalidUpdate(format!("{op} expects a document")));
        };
        let entries = fields.iter().take(MAX_UPDATE_FIELDS);
        match op.as_str() {
            "$set" => out.set.extend(entries.map(|(k, v)| (k.clone(), v.clone()))),
            "$inc" => {
                for (k, v) in entries {
                    if crate::document::TypeClass::of(v) != crate::document::TypeClass::Number {
                        return Err(DbError::InvalidUpdate(format!("$inc on '{k}' needs a numeric amount")));
                    }
                    out.inc.push((k.clone(), v.clone()));
                }
            }
            "$unset" => out.unset.extend(entries.map(|(k, _)| k.clone())),
            other => return Err(DbError::InvalidUpdate(format!("unsupported update operator '{other}'"))),
        }
    }
    if out.is_empty() {
        return Err(DbError::InvalidUpdate("update has no operations".into()));
    }
    Ok(out)
}

/// # Errors
/// `Json` for malformed JSON, otherwise as [`parse_update`].
pub fn parse_update_json(json: &str) -> DbResult<UpdateDoc> {
    let doc: BsonDocument = serde_json::from_str(json)?;
    parse_update(&doc)
}

fn direction(field: &str, v: &Bson) -> DbResult<Order> {
    match crate::document::as_f64(v) {
        Some(f) if f > 0.0 => Ok(Order::Asc),
        Some(f) if f < 0.0 => Ok(Order::Desc),
        _ => Err(DbError::QueryError(format!("sort direction for '{field}' must be 1 or -1, got {v}"))),
    }
}

/// Parse `{price: 1, title: -1}` into sort keys, in document order.
///
/// # Errors
/// `QueryError` for a direction other than a positive or negative number.
pub fn parse_sort(doc: &BsonDocument) -> DbResult<Vec<SortSpec>> {
    doc.iter().map(|(k, v)| Ok(SortSpec { field: k.clone(), order: direction(k, v)? })).collect()
}

/// Parse `{_id: 0, title: 1, author: 1}`. `_id` is only kept when set truthy;
/// other fields must be all inclusions or all exclusions.
///
/// # Errors
/// `QueryError` when inclusions and exclusions are mixed.
pub fn parse_projection(doc: &BsonDocument) -> DbResult<Projection> {
    let mut keep_id = false;
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for (k, v) in doc {
        if k == crate::types::ID_FIELD {
            keep_id = truthy(v);
        } else if truthy(v) {
            include.push(k.clone());
        } else {
            exclude.push(k.clone());
        }
    }
    let projection = match (include.is_empty(), exclude.is_empty()) {
        (false, false) => {
            return Err(DbError::QueryError("projection can't mix inclusion and exclusion".into()));
        }
        (false, true) => Projection::include(include),
        (true, false) => Projection::exclude(exclude),
        (true, true) if keep_id => Projection::include(Vec::<String>::new()),
        (true, true) => Projection::exclude(Vec::<String>::new()),
    };
    Ok(if keep_id { projection.with_id() } else { projection })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ProjectionMode;
    use bson::doc;

    #[test]
    fn implicit_and_with_ranges() {
        let f = parse_filter(&doc! {"in_stock": true, "published_year": {"$gt": 2010}}).unwrap();
        assert_eq!(f, Filter::And(vec![Filter::eq("in_stock", true), Filter::gt("published_year", 2010)]));
        let f = parse_filter(&doc! {"published_year": {"$gte": 1900, "$lt": 2000}}).unwrap();
        assert_eq!(f.conjuncts().len(), 2);
    }

    #[test]
    fn ne_becomes_negated_equality() {
        let f = parse_filter(&doc! {"genre": {"$ne": "Fantasy"}}).unwrap();
        assert_eq!(f, Filter::Not(Box::new(Filter::eq("genre", "Fantasy"))));
    }

    #[test]
    fn logical_and_set_operators() {
        let f = parse_filter_json(r#"{"$or":[{"genre":"Fantasy"},{"genre":{"$in":["Dystopian","Romance"]}}]}"#).unwrap();
        let Filter::Or(parts) = f else { panic!("expected $or") };
        assert!(matches!(parts[1], Filter::In { ref values, .. } if values.len() == 2));
        assert!(parse_filter(&doc! {"$where": "1"}).is_err());
        assert!(parse_filter(&doc! {"a": {"$near": 1}}).is_err());
        assert_eq!(parse_filter(&doc! {}).unwrap(), Filter::True);
    }

    #[cfg(feature = "regex")]
    #[test]
    fn regex_operands_compile_at_parse_time() {
        let re = bson::Regex { pattern: "^dune".try_into().unwrap(), options: "i".try_into().unwrap() };
        let f = parse_filter(&doc! {"title": {"$regex": Bson::RegularExpression(re)}}).unwrap();
        assert_eq!(f, Filter::regex("title", "^dune", true).unwrap());
        let f = parse_filter(&doc! {"title": {"$regex": "x", "$options": "i"}}).unwrap();
        assert!(matches!(f, Filter::Regex { ref pattern, .. } if pattern.case_insensitive()));
        let err = parse_filter(&doc! {"title": {"$regex": "(unclosed"}}).unwrap_err();
        assert!(matches!(err, DbError::QueryError(_)));
    }

    #[test]
    fn literal_subdocument_is_equality() {
        let f = parse_filter(&doc! {"meta": {"isbn": "x"}}).unwrap();
        assert!(matches!(f, Filter::Cmp { op: CmpOp::Eq, .. }));
    }

    #[test]
    fn update_operators() {
        let u = parse_update(&doc! {"$set": {"price": 12.5}, "$inc": {"stock": 1}, "$unset": {"old": ""}}).unwrap();
        assert_eq!(u.set, vec![("price".to_string(), Bson::Double(12.5))]);
        assert_eq!(u.inc.len(), 1);
        assert_eq!(u.unset, vec!["old".to_string()]);
        assert!(matches!(parse_update(&doc! {"$push": {"a": 1}}), Err(DbError::InvalidUpdate(_))));
        assert!(matches!(parse_update(&doc! {"$inc": {"a": "x"}}), Err(DbError::InvalidUpdate(_))));
        assert!(parse_update_json(r#"{"$set":{"price":9}}"#).is_ok());
    }

    #[test]
    fn sort_and_projection_documents() {
        let s = parse_sort(&doc! {"price": -1, "title": 1}).unwrap();
        assert_eq!(s, vec![SortSpec::desc("price"), SortSpec::asc("title")]);
        assert!(parse_sort(&doc! {"price": 0}).is_err());

        let p = parse_projection(&doc! {"_id": 0, "title": 1, "author": 1, "price": 1}).unwrap();
        assert_eq!(p.mode, ProjectionMode::Include);
        assert!(!p.keep_id);
        assert_eq!(p.fields, vec!["title", "author", "price"]);
        assert!(parse_projection(&doc! {"title": 1, "price": 0}).is_err());
        assert!(parse_projection(&doc! {"_id": 1}).unwrap().keep_id);
    }
}
