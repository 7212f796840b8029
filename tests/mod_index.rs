mod common;

use bson::doc;
use common::{book_collection, titles};
use shelfdb::DbError;
use shelfdb::index::{CostClass, IndexSpec};
use shelfdb::query::{Filter, FindOptions, Order, SortSpec, UpdateDoc, find_docs, update_one};

fn author_year() -> IndexSpec {
    IndexSpec::compound([("author", Order::Asc), ("published_year", Order::Desc)])
}

#[test]
fn compound_index_serves_its_leading_field() {
    let col = book_collection();
    let name = col.declare_index(author_year()).unwrap();
    assert_eq!(name, "author_1_published_year_-1");

    let plan = col.plan_for(&Filter::eq("author", "George Orwell"), None);
    assert!(plan.used_index());
    assert_eq!(plan.index.as_deref(), Some(name.as_str()));
    assert_eq!(plan.key_fields, ["author"]);
    assert_eq!(plan.cost, CostClass::Indexed);

    let plan = col.plan_for(&Filter::eq("published_year", 1934), None);
    assert!(!plan.used_index());
    assert_eq!(plan.cost, CostClass::FullScan);
}

#[test]
fn redeclaring_is_idempotent_and_conflicts_are_rejected() {
    let col = book_collection();
    let first = col.declare_index(author_year()).unwrap();
    assert_eq!(col.declare_index(author_year()).unwrap(), first);
    assert_eq!(col.index_descriptors().len(), 1);

    let flipped = IndexSpec::compound([("author", Order::Asc), ("published_year", Order::Asc)]);
    assert!(matches!(col.declare_index(flipped), Err(DbError::IndexConflict(_))));
    assert!(matches!(col.declare_index(author_year().unique()), Err(DbError::IndexConflict(_))));
    assert_eq!(col.index_descriptors().len(), 1);
}

#[test]
fn indexed_and_scanned_results_agree() {
    let plain = book_collection();
    let indexed = book_collection();
    indexed.create_index(&doc! {"price": 1}).unwrap();
    indexed.declare_index(author_year()).unwrap();

    let filters = [
        Filter::and(vec![Filter::gte("price", 10), Filter::lt("price", 13)]),
        Filter::eq("author", "F. Scott Fitzgerald"),
        Filter::and(vec![Filter::eq("author", "George Orwell"), Filter::gt("published_year", 1940)]),
        Filter::and(vec![Filter::eq("price", 6.5), Filter::eq("in_stock", true)]),
    ];
    for f in &filters {
        let a = find_docs(&plain, f, &FindOptions::default()).unwrap().to_vec();
        let b = find_docs(&indexed, f, &FindOptions::default()).unwrap().to_vec();
        assert_eq!(titles(&a), titles(&b), "{f:?}");
        assert!(indexed.plan_for(f, None).used_index(), "{f:?}");
    }
    let range = &filters[0];
    let hits = find_docs(&indexed, range, &FindOptions::default()).unwrap().to_vec();
    assert_eq!(titles(&hits), ["The Great Gatsby", "Tender Is the Night", "Burmese Days"]);
}

#[test]
fn the_most_specific_index_wins() {
    let col = book_collection();
    col.declare_index(IndexSpec::single("author", Order::Asc)).unwrap();
    let compound = col.declare_index(author_year()).unwrap();
    let f = Filter::and(vec![Filter::eq("author", "George Orwell"), Filter::eq("published_year", 1945)]);
    assert_eq!(col.plan_for(&f, None).index, Some(compound));
    assert_eq!(col.plan_for(&Filter::eq("author", "x"), None).index.as_deref(), Some("author_1"));
}

#[test]
fn sort_only_plans_report_coverage() {
    let col = book_collection();
    col.declare_index(IndexSpec::single("published_year", Order::Desc)).unwrap();
    let asc = [SortSpec::asc("published_year")];
    let plan = col.plan_for(&Filter::True, Some(&asc[..]));
    assert!(plan.sort_covered);
    assert!(plan.key_fields.is_empty());
    assert!(!plan.used_index());
    assert!(!col.plan_for(&Filter::True, Some(&[SortSpec::asc("title")][..])).sort_covered);
}

#[test]
fn unique_index_rejects_duplicates_without_side_effects() {
    let col = book_collection();
    col.declare_index(IndexSpec::single("title", Order::Asc).unique()).unwrap();

    let dup = col.insert_document(doc! {"title": "1984", "author": "Someone Else"});
    assert!(matches!(dup, Err(DbError::DuplicateKey { .. })));
    assert_eq!(col.len(), 7);

    let err = update_one(&col, &Filter::eq("title", "Animal Farm"), &UpdateDoc::set("title", "1984")).unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey { .. }));
    let docs = find_docs(&col, &Filter::eq("title", "Animal Farm"), &FindOptions::default()).unwrap().to_vec();
    assert_eq!(docs.len(), 1);
    assert!(col.indexes_consistent());

    // Documents without the key don't collide.
    col.insert_document(doc! {"author": "Anonymous"}).unwrap();
    col.insert_document(doc! {"author": "Anonymous"}).unwrap();
    assert_eq!(col.len(), 9);
}

#[test]
fn unique_build_over_duplicates_fails() {
    let col = book_collection();
    let err = col.declare_index(IndexSpec::single("author", Order::Asc).unique()).unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey { .. }));
    assert!(col.index_descriptors().is_empty());
}

#[test]
fn dropping_an_index_falls_back_to_scans() {
    let col = book_collection();
    let name = col.create_index(&doc! {"genre": 1}).unwrap();
    assert!(col.plan_for(&Filter::eq("genre", "Fiction"), None).used_index());
    assert!(col.drop_index(&name));
    assert!(!col.drop_index(&name));
    assert!(!col.plan_for(&Filter::eq("genre", "Fiction"), None).used_index());
}

#[test]
fn descriptors_count_entries() {
    let col = book_collection();
    col.create_index(&doc! {"author": 1}).unwrap();
    let d = &col.index_descriptors()[0];
    assert_eq!(d.name, "author_1");
    assert_eq!(d.entries, 7);
    assert_eq!(d.keys, 4);
}

#[test]
fn malformed_key_documents_are_rejected() {
    let col = book_collection();
    assert!(matches!(col.create_index(&doc! {}), Err(DbError::QueryError(_))));
    assert!(matches!(col.create_index(&doc! {"price": "asc"}), Err(DbError::QueryError(_))));
}

#[test]
fn large_integers_keep_exact_keys() {
    let edge = 1_i64 << 53;
    let plain = shelfdb::Collection::new("ids");
    let indexed = shelfdb::Collection::new("ids_indexed");
    indexed.declare_index(IndexSpec::single("n", Order::Asc)).unwrap();
    for col in [&plain, &indexed] {
        col.insert_many(vec![doc! {"n": edge}, doc! {"n": edge + 1}, doc! {"n": edge as f64}]).unwrap();
    }
    for f in [
        Filter::gt("n", edge),
        Filter::eq("n", edge + 1),
        Filter::gte("n", edge as f64),
        Filter::lt("n", edge + 1),
    ] {
        let a = find_docs(&plain, &f, &FindOptions::default()).unwrap().count();
        let b = find_docs(&indexed, &f, &FindOptions::default()).unwrap().count();
        assert_eq!(a, b, "{f:?}");
    }
    assert!(indexed.plan_for(&Filter::gt("n", edge), None).used_index());
    assert_eq!(find_docs(&indexed, &Filter::gt("n", edge), &FindOptions::default()).unwrap().count(), 1);
}

#[test]
fn unique_index_accepts_neighbouring_large_integers() {
    let edge = 1_i64 << 53;
    let col = shelfdb::Collection::new("ids");
    col.declare_index(IndexSpec::single("n", Order::Asc).unique()).unwrap();
    col.insert_document(doc! {"n": edge}).unwrap();
    col.insert_document(doc! {"n": edge + 1}).unwrap();
    assert!(matches!(col.insert_document(doc! {"n": edge as f64}), Err(DbError::DuplicateKey { .. })));
    assert!(col.indexes_consistent());
}
