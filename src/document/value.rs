use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;

pub const MAX_PATH_DEPTH: usize = 32;

/// Coarse value type used for comparability checks and cross-type ordering.
///
/// Variant order is the cross-type sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeClass {
    Null,
    Number,
    String,
    Document,
    Other,
    Bool,
    Date,
}

impl TypeClass {
    #[must_use]
    pub fn of(v: &Bson) -> Self {
        match v {
            Bson::Null | Bson::Undefined => Self::Null,
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => {
                Self::Number
            }
            Bson::String(_) => Self::String,
            Bson::Boolean(_) => Self::Bool,
            Bson::DateTime(_) => Self::Date,
            Bson::Document(_) => Self::Document,
            _ => Self::Other,
        }
    }

    /// Scalars are the only classes a predicate literal or group key may have.
    #[must_use]
    pub const fn is_scalar(self) -> bool {
        matches!(self, Self::Number | Self::String | Self::Bool | Self::Date)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Number => "number",
            Self::String => "string",
            Self::Document => "document",
            Self::Other => "other",
            Self::Bool => "boolean",
            Self::Date => "date",
        }
    }
}

/// Resolve a dotted path (`a.b.c`) inside nested documents.
#[must_use]
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut depth = 0usize;
    while let Some(part) = parts.next() {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

/// Write `value` at a dotted path, creating (or replacing non-document)
/// intermediate values.
pub fn insert_path(out: &mut BsonDocument, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            out.insert(path, value);
        }
        Some((head, tail)) => {
            if !matches!(out.get(head), Some(Bson::Document(_))) {
                out.insert(head, BsonDocument::new());
            }
            if let Some(Bson::Document(sub)) = out.get_mut(head) {
                insert_path(sub, tail, value);
            }
        }
    }
}

/// Visit every value in `doc` with its dotted path, descending into sub-documents.
pub fn flatten_paths<F: FnMut(&str, &Bson)>(doc: &BsonDocument, f: &mut F) {
    fn walk<F: FnMut(&str, &Bson)>(doc: &BsonDocument, prefix: &str, depth: usize, f: &mut F) {
        if depth > MAX_PATH_DEPTH {
            return;
        }
        for (k, v) in doc {
            let path = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
            f(&path, v);
            if let Bson::Document(sub) = v {
                walk(sub, &path, depth + 1, f);
            }
        }
    }
    walk(doc, "", 1, f);
}

#[must_use]
pub fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

// 2^63; exactly representable as f64
const I64_EDGE: f64 = 9_223_372_036_854_775_808.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    Int(i64),
    Float(OrderedFloat<f64>),
}

/// A number compared by exact value across widths. Integers stay `i64`, so
/// `2^53 + 1` and `2^53` remain distinct; integral doubles inside the `i64`
/// range are stored as integers, making `5` and `5.0` the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Number(Repr);

impl Number {
    #[must_use]
    pub const fn int(i: i64) -> Self {
        Self(Repr::Int(i))
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn float(f: f64) -> Self {
        if f.fract() == 0.0 && (-I64_EDGE..I64_EDGE).contains(&f) {
            return Self(Repr::Int(f as i64));
        }
        Self(Repr::Float(OrderedFloat(f)))
    }

    /// `None` for non-numeric values.
    #[must_use]
    pub fn of(v: &Bson) -> Option<Self> {
        match v {
            Bson::Int32(i) => Some(Self::int(i64::from(*i))),
            Bson::Int64(i) => Some(Self::int(*i)),
            other => as_f64(other).map(Self::float),
        }
    }
}

/// Exact comparison of an integer against a double; NaN sorts above every number.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= I64_EDGE {
        return Ordering::Less;
    }
    if f < -I64_EDGE {
        return Ordering::Greater;
    }
    let floor = f.floor();
    #[allow(clippy::cast_possible_truncation)]
    let whole = floor as i64;
    i.cmp(&whole).then(if f > floor { Ordering::Less } else { Ordering::Equal })
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Repr::Int(a), Repr::Int(b)) => a.cmp(&b),
            (Repr::Float(a), Repr::Float(b)) => a.cmp(&b),
            (Repr::Int(a), Repr::Float(b)) => cmp_int_float(a, b.0),
            (Repr::Float(a), Repr::Int(b)) => cmp_int_float(b, a.0).reverse(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Repr::Int(i) => write!(f, "{i}"),
            Repr::Float(x) => write!(f, "{}", x.0),
        }
    }
}

/// Total order over values. Numbers compare numerically across widths, strings
/// byte-wise, dates by millisecond; values of different classes order by class.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let (ca, cb) = (TypeClass::of(a), TypeClass::of(b));
    if ca != cb {
        return ca.cmp(&cb);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        _ if ca == TypeClass::Number => Number::of(a).cmp(&Number::of(b)),
        (Bson::Document(x), Bson::Document(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let ord = kx.cmp(ky).then_with(|| compare_bson(vx, vy));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ if ca == TypeClass::Null => Ordering::Equal,
        _ => {
            if a == b {
                Ordering::Equal
            } else {
                format!("{a:?}").cmp(&format!("{b:?}"))
            }
        }
    }
}

/// Equality as used by predicates and group keys: same class and equal under
/// [`compare_bson`], so `5 == 5.0`.
#[must_use]
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
    TypeClass::of(a) == TypeClass::of(b) && compare_bson(a, b) == Ordering::Equal
}
