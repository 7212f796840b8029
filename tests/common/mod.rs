#![allow(dead_code)]

use bson::{Document as BsonDocument, doc};
use shelfdb::Collection;

/// Small book catalogue shared by the integration tests.
pub fn books() -> Vec<BsonDocument> {
    vec![
        doc! {"title": "The Great Gatsby", "author": "F. Scott Fitzgerald", "genre": "Fiction", "published_year": 1925, "price": 10.99, "in_stock": true},
        doc! {"title": "Tender Is the Night", "author": "F. Scott Fitzgerald", "genre": "Fiction", "published_year": 1934, "price": 12.5, "in_stock": false},
        doc! {"title": "1984", "author": "George Orwell", "genre": "Dystopian", "published_year": 1949, "price": 8.99, "in_stock": true},
        doc! {"title": "Animal Farm", "author": "George Orwell", "genre": "Satire", "published_year": 1945, "price": 6.5, "in_stock": true},
        doc! {"title": "Brave New World", "author": "Aldous Huxley", "genre": "Dystopian", "published_year": 1932, "price": 9.75, "in_stock": false},
        doc! {"title": "To Kill a Mockingbird", "author": "Harper Lee", "genre": "Fiction", "published_year": 1960, "price": 14.0, "in_stock": true},
        doc! {"title": "Burmese Days", "author": "George Orwell", "genre": "Fiction", "published_year": 1934, "price": 11.25, "in_stock": true},
    ]
}

pub fn book_collection() -> Collection {
    let col = Collection::new("books");
    col.insert_many(books()).unwrap();
    col
}

pub fn titles(records: &[BsonDocument]) -> Vec<String> {
    records.iter().map(|r| r.get_str("title").unwrap().to_string()).collect()
}

/// The three-book price scenario used by the aggregation tests.
pub fn priced_collection() -> Collection {
    let col = Collection::new("priced");
    col.insert_many(vec![
        doc! {"title": "A", "price": 10, "genre": "F"},
        doc! {"title": "B", "price": 5, "genre": "F"},
        doc! {"title": "C", "price": 20, "genre": "G"},
    ])
    .unwrap();
    col
}
