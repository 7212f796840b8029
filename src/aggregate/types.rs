use crate::query::{Filter, SortSpec};
use bson::Bson;

/// Value expression evaluated against one record. Missing fields evaluate to
/// null and null operands make arithmetic and concatenation null.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Bson),
    Add(Vec<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Vec<Expr>),
    Divide(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    Concat(Vec<Expr>),
    ToString(Box<Expr>),
}

impl Expr {
    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    #[must_use]
    pub fn lit(v: impl Into<Bson>) -> Self {
        Self::Literal(v.into())
    }

    #[must_use]
    pub fn subtract(a: Self, b: Self) -> Self {
        Self::Subtract(Box::new(a), Box::new(b))
    }

    #[must_use]
    pub fn modulo(a: Self, b: Self) -> Self {
        Self::Mod(Box::new(a), Box::new(b))
    }

    #[must_use]
    pub fn divide(a: Self, b: Self) -> Self {
        Self::Divide(Box::new(a), Box::new(b))
    }

    #[must_use]
    pub fn to_string_expr(e: Self) -> Self {
        Self::ToString(Box::new(e))
    }

    /// `"1920s"` style bucket label for a year-like numeric field.
    #[must_use]
    pub fn decade_of(path: &str) -> Self {
        let year = Self::field(path);
        let floor = Self::subtract(year.clone(), Self::modulo(year, Self::lit(10)));
        Self::Concat(vec![Self::to_string_expr(floor), Self::lit("s")])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    /// Carry the input field through unchanged when present.
    Include,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count,
    Sum(Expr),
    Avg(Expr),
    Min(Expr),
    Max(Expr),
    First(Expr),
    Last(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub id: Expr,
    pub accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Project(Vec<(String, ProjectField)>),
    Group(GroupSpec),
    Sort(Vec<SortSpec>),
    Limit(usize),
    Skip(usize),
}

impl Stage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Project(_) => "$project",
            Self::Group(_) => "$group",
            Self::Sort(_) => "$sort",
            Self::Limit(_) => "$limit",
            Self::Skip(_) => "$skip",
        }
    }
}
