use bson::Document as BsonDocument;

/// Materialised result records of one `find`, in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    docs: Vec<BsonDocument>,
    pos: usize,
}

impl Cursor {
    #[must_use]
    pub const fn new(docs: Vec<BsonDocument>) -> Self {
        Self { docs, pos: 0 }
    }

    pub fn advance(&mut self) -> Option<BsonDocument> {
        let d = self.docs.get(self.pos)?.clone();
        self.pos += 1;
        Some(d)
    }

    /// Records not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.docs.len().saturating_sub(self.pos)
    }

    #[must_use]
    pub fn to_vec(mut self) -> Vec<BsonDocument> {
        self.docs.split_off(self.pos.min(self.docs.len()))
    }
}

impl Iterator for Cursor {
    type Item = BsonDocument;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}
