#[cfg(feature = "regex")]
use crate::errors::{DbError, DbResult};
use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_FILTER_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// Mongo-style direction number: `1` or `-1`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionMode {
    Include,
    Exclude,
}

/// Field inclusion/exclusion applied to `find` results. The identifier is only
/// kept when `keep_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub mode: ProjectionMode,
    pub fields: Vec<String>,
    pub keep_id: bool,
}

impl Projection {
    #[must_use]
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { mode: ProjectionMode::Include, fields: fields.into_iter().map(Into::into).collect(), keep_id: false }
    }

    #[must_use]
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { mode: ProjectionMode::Exclude, fields: fields.into_iter().map(Into::into).collect(), keep_id: false }
    }

    #[must_use]
    pub fn with_id(mut self) -> Self {
        self.keep_id = true;
        self
    }
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Option<Vec<SortSpec>>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl FindOptions {
    #[must_use]
    pub fn sorted(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn projected(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// 1-based page of `page_size` results; page 0 is treated as page 1.
    #[must_use]
    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        let page = if page == 0 { 1 } else { page };
        self.skip = Some((page - 1).saturating_mul(page_size));
        self.limit = Some(page_size);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn is_range(self) -> bool {
        !matches!(self, Self::Eq)
    }
}

/// Compiled regular expression for a `Regex` filter. Equality compares the
/// source text and case flag.
#[cfg(feature = "regex")]
#[derive(Debug, Clone)]
pub struct Pattern {
    re: regex::Regex,
    case_insensitive: bool,
}

#[cfg(feature = "regex")]
impl Pattern {
    /// # Errors
    /// The compile error when `source` is not a valid pattern.
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let re = regex::RegexBuilder::new(source).case_insensitive(case_insensitive).build()?;
        Ok(Self { re, case_insensitive })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.re.as_str()
    }

    #[must_use]
    pub const fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    #[must_use]
    pub fn is_match(&self, s: &str) -> bool {
        self.re.is_match(s)
    }
}

#[cfg(feature = "regex")]
impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str() && self.case_insensitive == other.case_insensitive
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    #[cfg(feature = "regex")]
    Regex { path: String, pattern: Pattern },
}

impl Filter {
    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }
    }

    #[must_use]
    pub fn gt(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Gt, value: value.into() }
    }

    #[must_use]
    pub fn gte(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Gte, value: value.into() }
    }

    #[must_use]
    pub fn lt(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Lt, value: value.into() }
    }

    #[must_use]
    pub fn lte(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Lte, value: value.into() }
    }

    /// # Errors
    /// `InvalidPredicate` when `pattern` does not compile.
    #[cfg(feature = "regex")]
    pub fn regex(path: impl Into<String>, pattern: &str, case_insensitive: bool) -> DbResult<Self> {
        let pattern = Pattern::new(pattern, case_insensitive)
            .map_err(|e| DbError::InvalidPredicate(format!("bad pattern: {e}")))?;
        Ok(Self::Regex { path: path.into(), pattern })
    }

    #[must_use]
    pub fn and(filters: Vec<Self>) -> Self {
        Self::And(filters)
    }

    /// Top-level conjuncts; a non-`And` filter is its own single conjunct.
    #[must_use]
    pub fn conjuncts(&self) -> Vec<&Self> {
        match self {
            Self::And(fs) => fs.iter().flat_map(Self::conjuncts).collect(),
            Self::True => Vec::new(),
            other => vec![other],
        }
    }
}

/// Field updates applied by the mutation executor.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, Bson)>,
    pub unset: Vec<String>,
}

impl UpdateDoc {
    #[must_use]
    pub fn set(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { set: vec![(path.into(), value.into())], ..Self::default() }
    }

    #[must_use]
    pub fn and_set(mut self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.push((path.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty() && self.unset.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted: u64,
}
