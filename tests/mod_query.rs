mod common;

use bson::{Bson, doc};
use common::{book_collection, titles};
use shelfdb::DbError;
use shelfdb::query::{
    Filter, FindOptions, Projection, SortSpec, count_docs, find_docs, parse_filter_json, parse_projection, parse_sort,
};

#[test]
fn filter_sort_and_project() {
    let col = book_collection();
    let opts = FindOptions::default()
        .sorted(vec![SortSpec::asc("published_year")])
        .projected(Projection::include(["title", "published_year"]));
    let docs = find_docs(&col, &Filter::eq("author", "George Orwell"), &opts).unwrap().to_vec();
    assert_eq!(titles(&docs), ["Burmese Days", "Animal Farm", "1984"]);
    assert_eq!(docs[0], doc! {"title": "Burmese Days", "published_year": 1934});
}

#[test]
fn records_lead_with_id_unless_projected_away() {
    let col = book_collection();
    let ids = col.list_ids();
    let all = find_docs(&col, &Filter::True, &FindOptions::default()).unwrap().to_vec();
    assert_eq!(all.len(), 7);
    assert_eq!(all[0].keys().next().map(String::as_str), Some("_id"));
    assert_eq!(all[0].get_str("_id").unwrap(), ids[0].to_string());

    let kept = FindOptions::default().projected(Projection::include(["title"]).with_id());
    let first = find_docs(&col, &Filter::True, &kept).unwrap().next().unwrap();
    assert_eq!(first.keys().cloned().collect::<Vec<_>>(), ["_id", "title"]);

    let excluded = FindOptions::default().projected(Projection::exclude(["price", "in_stock"]));
    let first = find_docs(&col, &Filter::True, &excluded).unwrap().next().unwrap();
    assert_eq!(first.keys().cloned().collect::<Vec<_>>(), ["title", "author", "genre", "published_year"]);
}

#[test]
fn sort_is_stable_on_ties() {
    let col = book_collection();
    let opts = FindOptions::default().sorted(vec![SortSpec::asc("genre")]);
    let docs = find_docs(&col, &Filter::True, &opts).unwrap().to_vec();
    assert_eq!(
        titles(&docs),
        [
            "1984",
            "Brave New World",
            "The Great Gatsby",
            "Tender Is the Night",
            "To Kill a Mockingbird",
            "Burmese Days",
            "Animal Farm"
        ]
    );
}

#[test]
fn multi_key_sort_with_mixed_directions() {
    let col = book_collection();
    let opts = FindOptions::default().sorted(vec![SortSpec::desc("published_year"), SortSpec::asc("title")]);
    let docs = find_docs(&col, &Filter::lte("published_year", 1934), &opts).unwrap().to_vec();
    assert_eq!(titles(&docs), ["Burmese Days", "Tender Is the Night", "Brave New World", "The Great Gatsby"]);
}

#[test]
fn missing_sort_values_come_first_ascending() {
    let col = shelfdb::Collection::new("n");
    col.insert_many(vec![doc! {"n": 2}, doc! {"n": 1}, doc! {"tag": "none"}]).unwrap();
    let docs = find_docs(&col, &Filter::True, &FindOptions::default().sorted(vec![SortSpec::asc("n")])).unwrap().to_vec();
    assert!(docs[0].get("n").is_none());
    assert_eq!(docs[1].get("n"), Some(&Bson::Int32(1)));
}

#[test]
fn pages_are_one_based_and_past_the_end_is_empty() {
    let col = book_collection();
    let sort = vec![SortSpec::asc("published_year")];
    let page = |n| {
        let opts = FindOptions::default().sorted(sort.clone()).page(n, 3);
        titles(&find_docs(&col, &Filter::True, &opts).unwrap().to_vec())
    };
    assert_eq!(page(1), ["The Great Gatsby", "Brave New World", "Tender Is the Night"]);
    assert_eq!(page(2), ["Burmese Days", "Animal Farm", "1984"]);
    assert_eq!(page(3), ["To Kill a Mockingbird"]);
    assert!(page(4).is_empty());
    assert_eq!(page(0), page(1));
}

#[test]
fn limit_zero_is_empty_and_large_limits_are_clamped() {
    let col = book_collection();
    assert_eq!(find_docs(&col, &Filter::True, &FindOptions::default().limit(0)).unwrap().count(), 0);

    let limits = shelfdb::QueryLimits { max_limit: 2, ..shelfdb::QueryLimits::default() };
    let small = shelfdb::Collection::with_limits("small", limits);
    small.insert_many(common::books()).unwrap();
    assert_eq!(find_docs(&small, &Filter::True, &FindOptions::default().limit(100)).unwrap().count(), 2);
}

#[test]
fn no_limit_returns_every_match() {
    let limits = shelfdb::QueryLimits { max_limit: 2, ..shelfdb::QueryLimits::default() };
    let small = shelfdb::Collection::with_limits("small", limits);
    small.insert_many(common::books()).unwrap();
    let all = find_docs(&small, &Filter::True, &FindOptions::default()).unwrap().count();
    assert_eq!(all, count_docs(&small, &Filter::True).unwrap());
    assert_eq!(all, 7);
}

#[test]
fn type_mismatch_is_an_error_and_missing_fields_never_match() {
    let col = book_collection();
    let err = find_docs(&col, &Filter::gt("published_year", "1930"), &FindOptions::default()).unwrap_err();
    assert!(matches!(err, DbError::InvalidPredicate(_)));
    let none = find_docs(&col, &Filter::gt("rating", 3), &FindOptions::default()).unwrap();
    assert_eq!(none.remaining(), 0);
}

#[test]
fn mismatch_inside_a_disjunction_still_fails() {
    let col = book_collection();
    let f = Filter::Or(vec![Filter::eq("genre", "Satire"), Filter::eq("price", true)]);
    assert!(matches!(count_docs(&col, &f), Err(DbError::InvalidPredicate(_))));
}

#[test]
fn numbers_compare_across_widths() {
    let col = book_collection();
    assert_eq!(count_docs(&col, &Filter::eq("published_year", 1934_i64)).unwrap(), 2);
    assert_eq!(count_docs(&col, &Filter::eq("published_year", 1934.0)).unwrap(), 2);
    assert_eq!(count_docs(&col, &Filter::gte("price", 12)).unwrap(), 2);
}

#[test]
fn parsed_queries() {
    let col = book_collection();
    let f = parse_filter_json(r#"{"$or":[{"genre":"Satire"},{"price":{"$gte":14}}]}"#).unwrap();
    let docs = find_docs(&col, &f, &FindOptions::default()).unwrap().to_vec();
    assert_eq!(titles(&docs), ["Animal Farm", "To Kill a Mockingbird"]);

    let f = parse_filter_json(r#"{"author":{"$in":["Aldous Huxley","Harper Lee"]}}"#).unwrap();
    assert_eq!(count_docs(&col, &f).unwrap(), 2);

    let f = parse_filter_json(r#"{"genre":{"$ne":"Fiction"},"in_stock":true}"#).unwrap();
    let opts = FindOptions::default()
        .sorted(parse_sort(&doc! {"price": -1}).unwrap())
        .projected(parse_projection(&doc! {"title": 1}).unwrap());
    let docs = find_docs(&col, &f, &opts).unwrap().to_vec();
    assert_eq!(docs, vec![doc! {"title": "1984"}, doc! {"title": "Animal Farm"}]);

    let f = parse_filter_json(r#"{"rating":{"$exists":false},"published_year":{"$gt":1940,"$lt":1950}}"#).unwrap();
    assert_eq!(count_docs(&col, &f).unwrap(), 2);
}

#[cfg(feature = "regex")]
#[test]
fn regex_matches_strings_only() {
    let col = book_collection();
    let f = parse_filter_json(r#"{"title":{"$regex":"^the","$options":"i"}}"#).unwrap();
    let docs = find_docs(&col, &f, &FindOptions::default()).unwrap().to_vec();
    assert_eq!(titles(&docs), ["The Great Gatsby"]);
    let f = Filter::regex("published_year", "19", false).unwrap();
    assert_eq!(count_docs(&col, &f).unwrap(), 0);
}

#[cfg(feature = "regex")]
#[test]
fn bson_regular_expression_operand_is_accepted() {
    let col = book_collection();
    let re = bson::Regex { pattern: "farm$".try_into().unwrap(), options: "i".try_into().unwrap() };
    let f = shelfdb::query::parse_filter(&doc! {"title": {"$regex": Bson::RegularExpression(re)}}).unwrap();
    let docs = find_docs(&col, &f, &FindOptions::default()).unwrap().to_vec();
    assert_eq!(titles(&docs), ["Animal Farm"]);
}

#[cfg(feature = "regex")]
#[test]
fn malformed_regex_is_reported_not_ignored() {
    let err = parse_filter_json(r#"{"title":{"$regex":"(unclosed"}}"#).unwrap_err();
    assert!(matches!(err, DbError::QueryError(_)));
}

#[test]
fn malformed_query_documents_are_rejected() {
    assert!(matches!(parse_filter_json(r#"{"price":{"$near":3}}"#), Err(DbError::QueryError(_))));
    assert!(matches!(parse_sort(&doc! {"price": "up"}), Err(DbError::QueryError(_))));
    assert!(matches!(parse_projection(&doc! {"title": 1, "price": 0}), Err(DbError::QueryError(_))));
    assert!(matches!(parse_filter_json("{not json"), Err(DbError::Json(_))));
}

#[test]
fn find_emits_a_dev_line() {
    let col = book_collection();
    let capture = shelfdb::devlog::capture();
    find_docs(&col, &Filter::True, &FindOptions::default()).unwrap();
    let lines = capture.take();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"op\":\"find\""));
    assert!(lines[0].contains("\"result_count\":7"));
}
