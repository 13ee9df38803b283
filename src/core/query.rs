//! Queries and the request parameters they are parsed from
//!
//! A [`Query`] describes what one resource should return: filters, sort,
//! pagination and a tree of nested queries keyed by sideload name. It is built
//! once per request (and once per requested sideload) and never mutated
//! afterwards.

use crate::core::error::QueryError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator used by filters and store conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Operator {
    /// Short symbol used in fingerprints and logs
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
        }
    }
}

/// A single filter predicate: operator plus value(s)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub operator: Operator,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            operator,
            value: value.into(),
        }
    }

    /// Split a filter key into attribute and operator
    ///
    /// # Format
    /// - Exact match: `field` (array values become `IN`)
    /// - Negation: `field!`
    /// - Comparison: `field>`, `field>=`, `field<`, `field<=`
    pub fn parse_key(key: &str, value: Value) -> (String, Self) {
        const SUFFIXES: [(&str, Operator); 5] = [
            (">=", Operator::Gte),
            ("<=", Operator::Lte),
            ("!", Operator::NotEq),
            (">", Operator::Gt),
            ("<", Operator::Lt),
        ];

        for (suffix, operator) in SUFFIXES {
            if let Some(attribute) = key.strip_suffix(suffix) {
                return (attribute.to_string(), Self::new(operator, value));
            }
        }

        let operator = if value.is_array() {
            Operator::In
        } else {
            Operator::Eq
        };
        (key.to_string(), Self::new(operator, value))
    }
}

/// Filter predicates per attribute, in the order they were added
pub type Filters = IndexMap<String, Vec<FilterPredicate>>;

/// Add a predicate, replacing one with the same operator on that attribute
///
/// `views>` and `views<` both survive, so two-sided ranges work; a second
/// `status` filter replaces the first.
pub(crate) fn insert_filter(filters: &mut Filters, attribute: String, predicate: FilterPredicate) {
    let predicates = filters.entry(attribute).or_default();
    match predicates
        .iter_mut()
        .find(|existing| existing.operator == predicate.operator)
    {
        Some(existing) => *existing = predicate,
        None => predicates.push(predicate),
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One `(attribute, direction)` sort clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortParam {
    pub attribute: String,
    pub direction: SortDirection,
}

impl SortParam {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Requested page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page size; `None` means "use the default page size"
    pub size: Option<usize>,

    /// Page number (starts at 1)
    pub number: usize,
}

impl Pagination {
    pub fn new(size: Option<usize>, number: usize) -> Self {
        Self {
            size,
            number: number.max(1),
        }
    }
}

/// Request parameters a [`Query`] can be parsed from
///
/// # Example
/// ```text
/// ?filter={"status": "published", "views>": 100}
///  &sort=created_at:desc,title
///  &page=2&per_page=10
///  &include=comments.author,tags
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Page number (starts at 1)
    pub page: Option<usize>,

    /// Number of items per page; `0` requests no records at all
    pub per_page: Option<usize>,

    /// Filters as a JSON object string
    pub filter: Option<String>,

    /// Comma separated sort clauses: `field`, `field:asc`, `field:desc` or `-field`
    pub sort: Option<String>,

    /// Comma separated, dot nested sideload paths
    pub include: Option<String>,

    /// Set to `false` to disable default pagination
    pub paginate: Option<bool>,
}

/// Immutable description of one resource's request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    filters: Filters,
    sort: Vec<SortParam>,
    pagination: Option<Pagination>,
    paginate: bool,
    sideloads: IndexMap<String, Query>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    /// An empty root query (default pagination enabled)
    pub fn new() -> Self {
        Self {
            filters: IndexMap::new(),
            sort: Vec::new(),
            pagination: None,
            paginate: true,
            sideloads: IndexMap::new(),
        }
    }

    /// An empty sideload query
    ///
    /// Nested queries are not paginated unless a page is explicitly requested,
    /// since the child scope spans every parent at once.
    pub fn nested() -> Self {
        Self {
            paginate: false,
            ..Self::new()
        }
    }

    /// Parse request parameters into a root query
    pub fn from_params(params: &QueryParams) -> Result<Self, QueryError> {
        let mut query = Self::new();

        if let Some(raw) = &params.filter {
            let value: Value =
                serde_json::from_str(raw).map_err(|e| QueryError::InvalidFilter {
                    message: e.to_string(),
                })?;
            let object = value.as_object().ok_or_else(|| QueryError::InvalidFilter {
                message: "filter must be a JSON object".to_string(),
            })?;
            for (key, value) in object {
                let (attribute, predicate) = FilterPredicate::parse_key(key, value.clone());
                insert_filter(&mut query.filters, attribute, predicate);
            }
        }

        if let Some(raw) = &params.sort {
            query.sort = parse_sort(raw)?;
        }

        if params.page.is_some() || params.per_page.is_some() {
            query.pagination = Some(Pagination::new(params.per_page, params.page.unwrap_or(1)));
        }

        if let Some(paginate) = params.paginate {
            query.paginate = paginate;
        }

        if let Some(raw) = &params.include {
            for path in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                query = query.include(path)?;
            }
        }

        Ok(query)
    }

    // === Builders ===

    pub fn with_filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        let (attribute, predicate) = FilterPredicate::parse_key(key, value.into());
        insert_filter(&mut self.filters, attribute, predicate);
        self
    }

    pub fn with_sort(mut self, sort: SortParam) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_page(mut self, size: usize, number: usize) -> Self {
        self.pagination = Some(Pagination::new(Some(size), number));
        self
    }

    pub fn with_paginate(mut self, paginate: bool) -> Self {
        self.paginate = paginate;
        self
    }

    /// Attach an explicit nested query under `name`
    ///
    /// Like [`Query::nested`], the sideload query only paginates when it
    /// carries an explicit page, whatever its `paginate` flag says.
    pub fn with_sideload(mut self, name: impl Into<String>, mut query: Query) -> Self {
        if query.pagination.is_none() {
            query.paginate = false;
        }
        self.sideloads.insert(name.into(), query);
        self
    }

    /// Add a dotted include path (`comments.author`), creating nested queries
    pub fn include(mut self, path: &str) -> Result<Self, QueryError> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(QueryError::InvalidInclude {
                path: path.to_string(),
            });
        }

        let mut node = &mut self;
        for segment in segments {
            node = node
                .sideloads
                .entry(segment.to_string())
                .or_insert_with(Query::nested);
        }
        Ok(self)
    }

    // === Accessors ===

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn sort(&self) -> &[SortParam] {
        &self.sort
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    /// Whether default pagination may be applied to this query
    pub fn paginate(&self) -> bool {
        self.paginate
    }

    pub fn sideloads(&self) -> &IndexMap<String, Query> {
        &self.sideloads
    }

    pub fn sideload(&self, name: &str) -> Option<&Query> {
        self.sideloads.get(name)
    }

    /// True when the request explicitly asked for a page of size zero
    pub fn zero_results(&self) -> bool {
        matches!(self.pagination, Some(Pagination { size: Some(0), .. }))
    }

    /// JSON rendering of the request, used as instrumentation payload
    pub fn to_params(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn parse_sort(raw: &str) -> Result<Vec<SortParam>, QueryError> {
    raw.split(',')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| {
            if let Some(attribute) = clause.strip_prefix('-') {
                return Ok(SortParam::desc(attribute));
            }
            match clause.split_once(':') {
                None => Ok(SortParam::asc(clause)),
                Some((attribute, "asc")) => Ok(SortParam::asc(attribute)),
                Some((attribute, "desc")) => Ok(SortParam::desc(attribute)),
                Some((attribute, direction)) => Err(QueryError::InvalidSort {
                    attribute: attribute.to_string(),
                    direction: direction.to_string(),
                }),
            }
        })
        .collect()
}
