//! Filter compilation: declarative filter groups to predicate trees.
//!
//! A search request carries a list of filter groups. Each group maps field
//! names to one [`FilterOperation`]; fields within a group combine with AND,
//! and the groups themselves combine with OR, so a request is already in
//! disjunctive normal form. [`compile`] lowers that structure into a
//! backend-neutral [`WhereClause`] an execution layer can translate.
//!
//! Field names are either a plain column (`"title"`) or a single-level
//! relation path (`"category.name"`); relation-qualified predicates nest
//! under a sub-map keyed by the relation name.
//!
//! Every clause that binds a value is assigned a parameter name that is
//! unique within the compiled statement, so repeated groups never collide:
//!
//! ```rust
//! use prax_search::{compile_group, FilterOperation, FilterOperator, QueryFilter};
//!
//! let mut group = QueryFilter::new();
//! group.insert(
//!     "title".to_string(),
//!     FilterOperation::with_operand(FilterOperator::Like, "Question%"),
//! );
//! group.insert(
//!     "category.name".to_string(),
//!     FilterOperation::with_operand(FilterOperator::Equals, "General"),
//! );
//!
//! // The second sibling group gets the "B" parameter prefix.
//! let predicates = compile_group(&group, 1).unwrap();
//! assert_eq!(predicates.parameter_names(), vec!["B0", "B1"]);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{QueryError, QueryResult};
use crate::operator::{FilterOperator, OperandArity};

/// A filter value that can be bound to a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values.
    List(Vec<FilterValue>),
    /// JSON value (objects, for the containment operators).
    Json(serde_json::Value),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Into::into).collect())
            }
            object @ serde_json::Value::Object(_) => Self::Json(object),
        }
    }
}

/// A bound parameter: a generated statement-unique name and the value bound
/// to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    /// The generated parameter name.
    pub param: String,
    /// The value to bind.
    pub value: FilterValue,
}

impl Bound {
    /// Create a new bound parameter.
    pub fn new(param: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            param: param.into(),
            value: value.into(),
        }
    }
}

/// Backend-selection hint for structural containment predicates.
///
/// These have no portable SQL form; the execution layer supplies the exact
/// fragment per backend, parameterized by the predicate's bound name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Containment {
    /// Key-existence test (`column ? :param`).
    JsonbExists,
    /// Structural containment test (`column @> :param`).
    JsonbContains,
    /// JSON containment test (`JSON_CONTAINS(column, :param)`).
    JsonContains,
}

impl Containment {
    /// The operator this hint was produced from.
    pub fn operator(&self) -> FilterOperator {
        match self {
            Self::JsonbExists => FilterOperator::JsonbExists,
            Self::JsonbContains => FilterOperator::JsonbContains,
            Self::JsonContains => FilterOperator::JsonContains,
        }
    }
}

/// A backend-neutral predicate over a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact match.
    Equals(Bound),
    /// Negated exact match.
    NotEquals(Bound),
    /// Greater than.
    Gt(Bound),
    /// Greater than or equal.
    Gte(Bound),
    /// Less than.
    Lt(Bound),
    /// Less than or equal.
    Lte(Bound),
    /// Case-sensitive pattern match.
    Like(Bound),
    /// Case-insensitive pattern match.
    ILike(Bound),
    /// Structural containment test with a backend-defined fragment.
    Raw {
        /// Which containment test the filter asked for.
        hint: Containment,
        /// The bound operand.
        bound: Bound,
    },
    /// Inclusive range test.
    Between {
        /// Lower bound (inclusive).
        low: Bound,
        /// Upper bound (inclusive).
        high: Bound,
    },
    /// Membership test; the bound value is a list.
    In(Bound),
    /// Null test.
    IsNull,
    /// Logical negation. Double negation is preserved, not simplified.
    Not(Box<Predicate>),
    /// Conjunction of predicates on the same column.
    All(Vec<Predicate>),
}

impl Predicate {
    /// Wrap this predicate in a logical negation.
    pub fn negated(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Combine with another predicate on the same column using AND.
    pub fn and_with(self, other: Predicate) -> Self {
        match self {
            Self::All(mut predicates) => {
                predicates.push(other);
                Self::All(predicates)
            }
            _ => Self::All(vec![self, other]),
        }
    }

    /// Collect every bound parameter name in this predicate.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_params(&mut names);
        names
    }

    fn collect_params<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Equals(b)
            | Self::NotEquals(b)
            | Self::Gt(b)
            | Self::Gte(b)
            | Self::Lt(b)
            | Self::Lte(b)
            | Self::Like(b)
            | Self::ILike(b)
            | Self::In(b) => out.push(&b.param),
            Self::Raw { bound, .. } => out.push(&bound.param),
            Self::Between { low, high } => {
                out.push(&low.param);
                out.push(&high.param);
            }
            Self::IsNull => {}
            Self::Not(inner) => inner.collect_params(out),
            Self::All(predicates) => {
                for predicate in predicates {
                    predicate.collect_params(out);
                }
            }
        }
    }
}

/// One entry in a predicate map: a column predicate, or the predicates of a
/// related entity nested one level deep.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateEntry {
    /// A predicate on a column of the primary entity.
    Column(Predicate),
    /// Predicates on columns of a related entity.
    Relation(IndexMap<String, Predicate>),
}

/// One AND-group of predicates, keyed by column or relation name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateMap {
    entries: IndexMap<String, PredicateEntry>,
}

impl PredicateMap {
    /// Create an empty predicate map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the map has no predicates.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Get the entry for a column or relation name.
    pub fn get(&self, name: &str) -> Option<&PredicateEntry> {
        self.entries.get(name)
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PredicateEntry)> {
        self.entries.iter()
    }

    /// Insert a predicate on a column of the primary entity.
    ///
    /// An existing predicate on the same column folds into a conjunction.
    pub fn insert_column(&mut self, column: impl Into<String>, predicate: Predicate) {
        let column = column.into();
        match self.entries.shift_remove(&column) {
            Some(PredicateEntry::Column(existing)) => {
                self.entries
                    .insert(column, PredicateEntry::Column(existing.and_with(predicate)));
            }
            _ => {
                self.entries.insert(column, PredicateEntry::Column(predicate));
            }
        }
    }

    /// Insert a predicate on a column of a related entity, creating the
    /// relation sub-map on first use.
    pub fn insert_related(
        &mut self,
        relation: impl Into<String>,
        column: impl Into<String>,
        predicate: Predicate,
    ) {
        let relation = relation.into();
        let column = column.into();
        let mut inner = match self.entries.shift_remove(&relation) {
            Some(PredicateEntry::Relation(inner)) => inner,
            _ => IndexMap::new(),
        };
        match inner.shift_remove(&column) {
            Some(existing) => {
                inner.insert(column, existing.and_with(predicate));
            }
            None => {
                inner.insert(column, predicate);
            }
        }
        self.entries.insert(relation, PredicateEntry::Relation(inner));
    }

    /// Collect every bound parameter name in this group.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for entry in self.entries.values() {
            match entry {
                PredicateEntry::Column(predicate) => predicate.collect_params(&mut names),
                PredicateEntry::Relation(inner) => {
                    for predicate in inner.values() {
                        predicate.collect_params(&mut names);
                    }
                }
            }
        }
        names
    }

    /// AND this group with another, folding same-column predicates together.
    pub fn merge(mut self, other: PredicateMap) -> PredicateMap {
        for (name, entry) in other.entries {
            match entry {
                PredicateEntry::Column(predicate) => self.insert_column(name, predicate),
                PredicateEntry::Relation(inner) => {
                    for (column, predicate) in inner {
                        self.insert_related(name.clone(), column, predicate);
                    }
                }
            }
        }
        self
    }
}

/// A compiled where-clause: one AND-group, or an OR-list of AND-groups.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// A single AND-group.
    Single(PredicateMap),
    /// An OR-list of AND-groups.
    Any(Vec<PredicateMap>),
}

impl WhereClause {
    /// Create an empty where-clause (matches everything).
    pub fn none() -> Self {
        Self::Single(PredicateMap::new())
    }

    /// Create a where-clause from an OR-list of groups, collapsing the
    /// degenerate shapes.
    pub fn any(mut groups: Vec<PredicateMap>) -> Self {
        match groups.len() {
            0 => Self::none(),
            1 => Self::Single(groups.remove(0)),
            _ => Self::Any(groups),
        }
    }

    /// Check if this clause constrains nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(map) => map.is_empty(),
            Self::Any(groups) => groups.iter().all(PredicateMap::is_empty),
        }
    }

    /// View the OR-groups of this clause.
    pub fn groups(&self) -> &[PredicateMap] {
        match self {
            Self::Single(map) => std::slice::from_ref(map),
            Self::Any(groups) => groups,
        }
    }

    /// AND this clause with another by distributing over the OR-lists.
    pub fn and_merge(self, other: WhereClause) -> WhereClause {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let left = self.into_groups();
        let right = other.into_groups();
        let mut merged = Vec::with_capacity(left.len() * right.len());
        for left_group in &left {
            for right_group in &right {
                merged.push(left_group.clone().merge(right_group.clone()));
            }
        }
        Self::any(merged)
    }

    /// Collect every bound parameter name across all groups.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.groups()
            .iter()
            .flat_map(PredicateMap::parameter_names)
            .collect()
    }

    fn into_groups(self) -> Vec<PredicateMap> {
        match self {
            Self::Single(map) => vec![map],
            Self::Any(groups) => groups,
        }
    }
}

impl Default for WhereClause {
    fn default() -> Self {
        Self::none()
    }
}

/// A field address, parsed once at the compiler boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// A column on the primary entity.
    Plain(String),
    /// A column on a related entity, one level deep.
    Qualified {
        /// The relation name.
        relation: String,
        /// The column on the related entity.
        column: String,
    },
}

impl FieldPath {
    /// Parse a field name into a plain column or a `relation.column` path.
    ///
    /// More than one dot, or an empty segment, fails with
    /// [`ErrorCode::InvalidRelationPath`](crate::ErrorCode::InvalidRelationPath).
    pub fn parse(field: &str) -> QueryResult<Self> {
        let mut segments = field.split('.');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(column), None, None) if !column.is_empty() => {
                Ok(Self::Plain(column.to_string()))
            }
            (Some(relation), Some(column), None)
                if !relation.is_empty() && !column.is_empty() =>
            {
                Ok(Self::Qualified {
                    relation: relation.to_string(),
                    column: column.to_string(),
                })
            }
            _ => Err(QueryError::invalid_relation_path(field)),
        }
    }
}

/// One filter operation on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOperation {
    /// The comparison operator.
    pub operator: FilterOperator,
    /// The operand; required for every operator except `IS_NULL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand: Option<FilterValue>,
    /// Logically negate the resolved predicate.
    #[serde(default)]
    pub not: bool,
}

impl FilterOperation {
    /// Create an operation with no operand.
    pub fn new(operator: FilterOperator) -> Self {
        Self {
            operator,
            operand: None,
            not: false,
        }
    }

    /// Create an operation with an operand.
    pub fn with_operand(operator: FilterOperator, operand: impl Into<FilterValue>) -> Self {
        Self {
            operator,
            operand: Some(operand.into()),
            not: false,
        }
    }

    /// Mark the operation as negated.
    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }

    /// Check the operand shape against the operator's arity.
    ///
    /// An operand supplied to `IS_NULL` is ignored rather than rejected.
    pub fn validate(&self, field: &str) -> QueryResult<()> {
        match self.operator.arity() {
            OperandArity::None => Ok(()),
            OperandArity::One => match &self.operand {
                Some(_) => Ok(()),
                None => Err(QueryError::operand_arity(field, "operand is required")),
            },
            OperandArity::Pair => match &self.operand {
                Some(FilterValue::List(values)) if values.len() == 2 => Ok(()),
                _ => Err(QueryError::operand_arity(
                    field,
                    "BETWEEN requires a 2-element list",
                )),
            },
            OperandArity::Many => match &self.operand {
                Some(FilterValue::List(_)) => Ok(()),
                _ => Err(QueryError::operand_arity(field, "IN requires a list operand")),
            },
        }
    }
}

/// One filter group: field name to operation, AND-combined.
pub type QueryFilter = IndexMap<String, FilterOperation>;

/// Generates bound-parameter names unique within one compiled statement.
#[derive(Debug)]
pub(crate) struct ParamNames {
    prefix: String,
    counter: usize,
}

impl ParamNames {
    /// Names for one filter group, prefixed by the group's base-26 letters.
    pub(crate) fn for_group(index: usize) -> Self {
        Self::with_prefix(group_prefix(index))
    }

    /// Names under an explicit prefix (the cursor clause reserves `cursor`,
    /// which no base-26 group prefix can produce).
    pub(crate) fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }

    /// Produce the next name in this namespace.
    pub(crate) fn next(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.counter);
        self.counter += 1;
        name
    }
}

/// Encode a zero-based group index as a base-26 letter prefix
/// (0 → "A", 25 → "Z", 26 → "AA").
pub fn group_prefix(index: usize) -> String {
    let mut remaining = index as i64;
    let mut letters = Vec::new();
    while remaining >= 0 {
        letters.push(b'A' + (remaining % 26) as u8);
        remaining = remaining / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Build the predicate for one field operation, consuming parameter names as
/// needed.
fn build_predicate(
    field: &str,
    operation: &FilterOperation,
    names: &mut ParamNames,
) -> QueryResult<Predicate> {
    operation.validate(field)?;
    let operand = || {
        operation
            .operand
            .clone()
            .ok_or_else(|| QueryError::operand_arity(field, "operand is required"))
    };

    let predicate = match operation.operator {
        FilterOperator::Equals => Predicate::Equals(Bound::new(names.next(), operand()?)),
        FilterOperator::NotEquals => Predicate::NotEquals(Bound::new(names.next(), operand()?)),
        FilterOperator::GreaterThan => Predicate::Gt(Bound::new(names.next(), operand()?)),
        FilterOperator::GreaterThanOrEqual => {
            Predicate::Gte(Bound::new(names.next(), operand()?))
        }
        FilterOperator::LessThan => Predicate::Lt(Bound::new(names.next(), operand()?)),
        FilterOperator::LessThanOrEqual => Predicate::Lte(Bound::new(names.next(), operand()?)),
        FilterOperator::Like => Predicate::Like(Bound::new(names.next(), operand()?)),
        FilterOperator::ILike => Predicate::ILike(Bound::new(names.next(), operand()?)),
        FilterOperator::JsonbExists => Predicate::Raw {
            hint: Containment::JsonbExists,
            bound: Bound::new(names.next(), operand()?),
        },
        FilterOperator::JsonbContains => Predicate::Raw {
            hint: Containment::JsonbContains,
            bound: Bound::new(names.next(), operand()?),
        },
        FilterOperator::JsonContains => Predicate::Raw {
            hint: Containment::JsonContains,
            bound: Bound::new(names.next(), operand()?),
        },
        FilterOperator::Between => {
            let FilterValue::List(values) = operand()? else {
                return Err(QueryError::operand_arity(
                    field,
                    "BETWEEN requires a 2-element list",
                ));
            };
            let mut values = values.into_iter();
            match (values.next(), values.next()) {
                (Some(low), Some(high)) => Predicate::Between {
                    low: Bound::new(names.next(), low),
                    high: Bound::new(names.next(), high),
                },
                _ => {
                    return Err(QueryError::operand_arity(
                        field,
                        "BETWEEN requires a 2-element list",
                    ));
                }
            }
        }
        FilterOperator::In => Predicate::In(Bound::new(names.next(), operand()?)),
        FilterOperator::IsNull => Predicate::IsNull,
    };

    // The null test is produced independent of negation.
    if operation.not && operation.operator != FilterOperator::IsNull {
        Ok(predicate.negated())
    } else {
        Ok(predicate)
    }
}

/// Compile one filter group at its position among sibling groups.
///
/// The group index selects the base-26 parameter prefix, so sibling groups
/// of one search never produce colliding parameter names.
pub fn compile_group(group: &QueryFilter, index: usize) -> QueryResult<PredicateMap> {
    let mut names = ParamNames::for_group(index);
    let mut map = PredicateMap::new();
    for (field, operation) in group {
        let path = FieldPath::parse(field)?;
        let predicate = build_predicate(field, operation, &mut names)?;
        match path {
            FieldPath::Plain(column) => map.insert_column(column, predicate),
            FieldPath::Qualified { relation, column } => {
                map.insert_related(relation, column, predicate)
            }
        }
    }
    trace!(group = index, fields = map.len(), "compiled filter group");
    Ok(map)
}

/// Compile a list of filter groups into an OR-combined where-clause.
pub fn compile(groups: &[QueryFilter]) -> QueryResult<WhereClause> {
    debug!(groups = groups.len(), "compiling filter groups");
    let mut compiled = Vec::with_capacity(groups.len());
    for (index, group) in groups.iter().enumerate() {
        compiled.push(compile_group(group, index)?);
    }
    Ok(WhereClause::any(compiled))
}
