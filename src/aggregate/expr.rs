use super::types::Expr;
use crate::document::{TypeClass, as_f64, get_path};
use crate::errors::{DbError, DbResult};
use bson::{Bson, Document as BsonDocument};

enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(op: &str, v: &Bson) -> DbResult<Option<Self>> {
        match v {
            Bson::Null | Bson::Undefined => Ok(None),
            Bson::Int32(i) => Ok(Some(Self::Int(i64::from(*i)))),
            Bson::Int64(i) => Ok(Some(Self::Int(*i))),
            other => match as_f64(other) {
                Some(f) => Ok(Some(Self::Float(f))),
                None => Err(DbError::InvalidExpression(format!(
                    "{op} needs numeric operands, got a {}",
                    TypeClass::of(other).name()
                ))),
            },
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
        }
    }
}

/// Evaluate `expr` against `record`.
///
/// # Errors
/// `InvalidExpression` for non-numeric arithmetic operands, division or
/// modulo by zero, non-string `Concat` operands, or a value `ToString`
/// can't render.
pub fn eval_expr(expr: &Expr, record: &BsonDocument) -> DbResult<Bson> {
    match expr {
        Expr::Field(path) => Ok(get_path(record, path).cloned().unwrap_or(Bson::Null)),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Add(items) => fold("$add", items, record, i64::checked_add, |a, b| a + b, 0),
        Expr::Multiply(items) => fold("$multiply", items, record, i64::checked_mul, |a, b| a * b, 1),
        Expr::Subtract(a, b) => {
            let (Some(x), Some(y)) = (operand("$subtract", a, record)?, operand("$subtract", b, record)?) else {
                return Ok(Bson::Null);
            };
            Ok(int_or_float(x, y, i64::checked_sub, |a, b| a - b))
        }
        Expr::Divide(a, b) => {
            let (Some(x), Some(y)) = (operand("$divide", a, record)?, operand("$divide", b, record)?) else {
                return Ok(Bson::Null);
            };
            let d = y.as_f64();
            if d == 0.0 {
                return Err(DbError::InvalidExpression("$divide by zero".into()));
            }
            Ok(Bson::Double(x.as_f64() / d))
        }
        Expr::Mod(a, b) => {
            let (Some(x), Some(y)) = (operand("$mod", a, record)?, operand("$mod", b, record)?) else {
                return Ok(Bson::Null);
            };
            if y.as_f64() == 0.0 {
                return Err(DbError::InvalidExpression("$mod by zero".into()));
            }
            Ok(int_or_float(x, y, i64::checked_rem, |a, b| a % b))
        }
        Expr::Concat(items) => {
            let mut out = String::new();
            for item in items {
                match eval_expr(item, record)? {
                    Bson::String(s) => out.push_str(&s),
                    Bson::Null | Bson::Undefined => return Ok(Bson::Null),
                    other => {
                        return Err(DbError::InvalidExpression(format!(
                            "$concat needs strings, got a {}",
                            TypeClass::of(&other).name()
                        )));
                    }
                }
            }
            Ok(Bson::String(out))
        }
        Expr::ToString(inner) => render(eval_expr(inner, record)?),
    }
}

fn operand(op: &str, e: &Expr, record: &BsonDocument) -> DbResult<Option<Num>> {
    Num::of(op, &eval_expr(e, record)?)
}

fn int_or_float(x: Num, y: Num, int: fn(i64, i64) -> Option<i64>, float: fn(f64, f64) -> f64) -> Bson {
    match (&x, &y) {
        (Num::Int(a), Num::Int(b)) => int(*a, *b).map_or_else(|| Bson::Double(float(x.as_f64(), y.as_f64())), Bson::Int64),
        _ => Bson::Double(float(x.as_f64(), y.as_f64())),
    }
}

fn fold(
    op: &str,
    items: &[Expr],
    record: &BsonDocument,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
    unit: i64,
) -> DbResult<Bson> {
    let mut acc = Num::Int(unit);
    for item in items {
        let Some(n) = operand(op, item, record)? else {
            return Ok(Bson::Null);
        };
        acc = match int_or_float(acc, n, int, float) {
            Bson::Int64(i) => Num::Int(i),
            other => Num::Float(as_f64(&other).unwrap_or(f64::NAN)),
        };
    }
    Ok(match acc {
        Num::Int(i) => Bson::Int64(i),
        Num::Float(f) => Bson::Double(f),
    })
}

fn render(v: Bson) -> DbResult<Bson> {
    Ok(match v {
        Bson::Null | Bson::Undefined => Bson::Null,
        Bson::String(s) => Bson::String(s),
        Bson::Int32(i) => Bson::String(i.to_string()),
        Bson::Int64(i) => Bson::String(i.to_string()),
        Bson::Double(f) => Bson::String(f.to_string()),
        Bson::Boolean(b) => Bson::String(b.to_string()),
        Bson::DateTime(d) => {
            let ms = d.timestamp_millis();
            let Some(dt) = chrono::DateTime::from_timestamp_millis(ms) else {
                return Err(DbError::InvalidExpression(format!("date {ms} out of range")));
            };
            Bson::String(dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        }
        other => {
            return Err(DbError::InvalidExpression(format!(
                "$toString can't render a {}",
                TypeClass::of(&other).name()
            )));
        }
    })
}
