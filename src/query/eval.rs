use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_FILTER_DEPTH, MAX_IN_SET, Order, Projection, ProjectionMode, SortSpec};
use crate::document::{TypeClass, bson_eq, compare_bson, get_path, insert_path};
use crate::errors::{DbError, DbResult};
use crate::types::ID_FIELD;

/// Type-check then evaluate `filter` against `doc`.
///
/// The whole tree is checked before evaluation starts, so the outcome of a
/// conjunction never depends on operand order.
///
/// # Errors
/// `InvalidPredicate` if a comparison literal is not a scalar or the document
/// holds a value of a different type class at a compared path.
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> DbResult<bool> {
    check_filter(doc, filter)?;
    Ok(matches(doc, filter))
}

/// Validate every comparison leaf against the values present in `doc`.
///
/// # Errors
/// See [`eval_filter`].
pub fn check_filter(doc: &BsonDocument, filter: &Filter) -> DbResult<()> {
    visit_comparisons(filter, &mut |path, value| {
        let literal = literal_class(path, value)?;
        match get_path(doc, path) {
            Some(v) => check_classes(path, literal, TypeClass::of(v)),
            None => Ok(()),
        }
    })
}

/// Walk every `Cmp` leaf of `filter` in tree order.
pub(crate) fn visit_comparisons<F>(filter: &Filter, f: &mut F) -> DbResult<()>
where
    F: FnMut(&str, &Bson) -> DbResult<()>,
{
    fn walk<F>(filter: &Filter, depth: usize, f: &mut F) -> DbResult<()>
    where
        F: FnMut(&str, &Bson) -> DbResult<()>,
    {
        if depth > MAX_FILTER_DEPTH {
            return Err(DbError::InvalidPredicate(format!("filter nested deeper than {MAX_FILTER_DEPTH}")));
        }
        match filter {
            Filter::And(fs) | Filter::Or(fs) => fs.iter().try_for_each(|x| walk(x, depth + 1, f)),
            Filter::Not(inner) => walk(inner, depth + 1, f),
            Filter::Cmp { path, value, .. } => f(path, value),
            _ => Ok(()),
        }
    }
    walk(filter, 0, f)
}

/// Class of a comparison literal; only scalars may be compared.
pub(crate) fn literal_class(path: &str, value: &Bson) -> DbResult<TypeClass> {
    let class = TypeClass::of(value);
    if class.is_scalar() {
        Ok(class)
    } else {
        Err(DbError::InvalidPredicate(format!(
            "cannot compare field '{path}' against a {} literal",
            class.name()
        )))
    }
}

/// Null values behave like absent fields; any other mismatch is an error.
pub(crate) fn check_classes(path: &str, literal: TypeClass, found: TypeClass) -> DbResult<()> {
    if found == TypeClass::Null || found == literal {
        Ok(())
    } else {
        Err(DbError::InvalidPredicate(format!(
            "field '{path}' holds a {} value, compared against a {} literal",
            found.name(),
            literal.name()
        )))
    }
}

/// Boolean evaluation without type checks. Absent or null fields make every
/// comparison false; mismatched classes compare false.
#[must_use]
pub fn matches(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| matches(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| matches(doc, f)),
        Filter::Not(f) => !matches(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => present(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !present(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => present(doc, path).is_some_and(|v| compare_op(v, *op, value)),
        #[cfg(feature = "regex")]
        Filter::Regex { path, pattern } => {
            matches!(get_path(doc, path), Some(Bson::String(s)) if pattern.is_match(s))
        }
    }
}

fn present<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    get_path(doc, path).filter(|v| TypeClass::of(v) != TypeClass::Null)
}

fn compare_op(v: &Bson, op: CmpOp, literal: &Bson) -> bool {
    if TypeClass::of(v) != TypeClass::of(literal) {
        return false;
    }
    let ord = compare_bson(v, literal);
    match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Gte => ord != Ordering::Less,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Lte => ord != Ordering::Greater,
    }
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| bson_eq(x, v))
}

/// Multi-key comparison; missing values sort before present ones.
#[must_use]
pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Apply a projection to a result record (`_id` first, as produced by
/// `Document::to_record`).
#[must_use]
pub fn project_record(record: &BsonDocument, projection: &Projection, max_fields: usize) -> BsonDocument {
    let mut out = BsonDocument::new();
    if projection.keep_id
        && let Some(id) = record.get(ID_FIELD)
    {
        out.insert(ID_FIELD, id.clone());
    }
    let fields: Vec<&String> =
        projection.fields.iter().filter(|f| f.as_str() != ID_FIELD).take(max_fields).collect();
    match projection.mode {
        ProjectionMode::Include => {
            for f in fields {
                if let Some(v) = get_path(record, f) {
                    insert_path(&mut out, f, v.clone());
                }
            }
        }
        ProjectionMode::Exclude => {
            for (k, v) in record {
                if k != ID_FIELD && !fields.iter().any(|f| *f == k) {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn absent_field_is_false_not_error() {
        let d = doc! {"title": "A"};
        assert!(!eval_filter(&d, &Filter::gt("price", 3)).unwrap());
        assert!(!eval_filter(&d, &Filter::eq("price", 3)).unwrap());
    }

    #[test]
    fn null_behaves_like_absent() {
        let d = doc! {"price": Bson::Null};
        assert!(!eval_filter(&d, &Filter::lt("price", 3)).unwrap());
    }

    #[test]
    fn mismatched_types_are_rejected() {
        let d = doc! {"published_year": "1999"};
        let err = eval_filter(&d, &Filter::gt("published_year", 1990)).unwrap_err();
        assert!(matches!(err, DbError::InvalidPredicate(_)));
    }

    #[test]
    fn non_scalar_literal_is_rejected_even_without_field() {
        let d = doc! {};
        let err = eval_filter(&d, &Filter::eq("tags", bson::bson!(["a"]))).unwrap_err();
        assert!(matches!(err, DbError::InvalidPredicate(_)));
    }

    #[test]
    fn conjunction_order_does_not_change_outcome() {
        let d = doc! {"in_stock": false, "published_year": "x"};
        let a = Filter::And(vec![Filter::eq("in_stock", true), Filter::gt("published_year", 2010)]);
        let b = Filter::And(vec![Filter::gt("published_year", 2010), Filter::eq("in_stock", true)]);
        assert!(eval_filter(&d, &a).is_err());
        assert!(eval_filter(&d, &b).is_err());
    }

    #[test]
    fn in_and_nin_use_numeric_equality() {
        let d = doc! {"n": 5};
        let f = Filter::In { path: "n".into(), values: vec![Bson::Double(5.0), Bson::String("x".into())] };
        assert!(matches(&d, &f));
        let nf = Filter::Nin { path: "n".into(), values: vec![Bson::Int64(5)] };
        assert!(!matches(&d, &nf));
        assert!(matches(&doc! {}, &nf));
    }

    #[test]
    fn projection_drops_id_unless_requested() {
        let rec = doc! {"_id": "abc", "title": "A", "price": 1.0, "genre": "F"};
        let p = project_record(&rec, &Projection::include(["title", "price"]), 64);
        assert_eq!(p, doc! {"title": "A", "price": 1.0});
        let p = project_record(&rec, &Projection::include(["title"]).with_id(), 64);
        assert_eq!(p, doc! {"_id": "abc", "title": "A"});
        let p = project_record(&rec, &Projection::exclude(["price"]), 64);
        assert_eq!(p, doc! {"title": "A", "genre": "F"});
    }

    #[test]
    fn dotted_include_nests_like_pipeline_project() {
        let rec = doc! {"_id": "abc", "title": "A", "meta": {"isbn": "x", "pages": 300}};
        let p = project_record(&rec, &Projection::include(["title", "meta.isbn"]), 64);
        assert_eq!(p, doc! {"title": "A", "meta": {"isbn": "x"}});
    }

    #[cfg(feature = "regex")]
    #[test]
    fn regex_matches_strings_only() {
        let f = Filter::regex("title", "^the", true).unwrap();
        assert!(matches(&doc! {"title": "The Hobbit"}, &f));
        assert!(!matches(&doc! {"title": 12}, &f));
        assert!(matches!(Filter::regex("title", "(unclosed", false), Err(DbError::InvalidPredicate(_))));
    }
}
