use bson::{Bson, doc};
use shelfdb::Collection;
use shelfdb::index::IndexSpec;
use shelfdb::query::{Filter, FindOptions, Order, UpdateDoc, find_docs, update_many};
use std::sync::Arc;
use std::thread;

#[test]
fn readers_never_see_half_applied_updates() {
    let col = Arc::new(Collection::new("pairs"));
    col.declare_index(IndexSpec::single("a", Order::Asc)).unwrap();
    col.insert_many((0..50).map(|i| doc! {"a": 0_i64, "b": 0_i64, "i": i})).unwrap();

    let writer = {
        let col = Arc::clone(&col);
        thread::spawn(move || {
            let bump = UpdateDoc { inc: vec![("a".into(), Bson::Int64(1)), ("b".into(), Bson::Int64(1))], ..UpdateDoc::default() };
            for _ in 0..100 {
                let report = update_many(&col, &Filter::True, &bump).unwrap();
                assert_eq!(report.modified, 50);
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let col = Arc::clone(&col);
            thread::spawn(move || {
                for _ in 0..100 {
                    let docs = find_docs(&col, &Filter::gte("a", 0), &FindOptions::default()).unwrap().to_vec();
                    assert_eq!(docs.len(), 50);
                    let first = docs[0].get_i64("a").unwrap();
                    for d in &docs {
                        assert_eq!(d.get_i64("a").unwrap(), d.get_i64("b").unwrap());
                        assert_eq!(d.get_i64("a").unwrap(), first);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(find_docs(&col, &Filter::eq("a", 100), &FindOptions::default()).unwrap().count(), 50);
    assert!(col.indexes_consistent());
}

#[test]
fn collections_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Collection>();
    assert_send_sync::<shelfdb::Database>();
}
