//! Pagination request life cycle: offset and cursor strategies.
//!
//! A search request paginates one of two ways, chosen once per request and
//! never switched mid-request:
//!
//! - **Offset**: a finite non-negative offset becomes the plan's `skip`;
//!   the where-clause is built from the request's own filters alone.
//! - **Cursor**: an opaque token decodes into the previous page's last-row
//!   key tuple; a "strictly after this tuple" predicate is merged into the
//!   filters with AND, and `skip` is not used.
//!
//! When neither an offset nor a cursor is supplied the request is a
//! first-page fetch and pagination is a no-op at compile time.
//!
//! ```rust
//! use prax_search::{continue_after, CursorTuple, OrderMap, SortOrder};
//!
//! let mut order = OrderMap::new();
//! order.insert("id".to_string(), SortOrder::Asc);
//!
//! let mut tuple = CursorTuple::new();
//! tuple.insert("id", serde_json::json!(42));
//!
//! // One ascending key: a single `id > 42` group.
//! let clause = continue_after(&tuple, &order);
//! assert_eq!(clause.groups().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::CursorTuple;
use crate::error::QueryResult;
use crate::filter::{self, Bound, ParamNames, Predicate, PredicateMap, QueryFilter, WhereClause};
use crate::request::ReadManyRequest;
use crate::types::{OrderMap, SortOrder};

/// How one search request paginates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaginationRequest {
    /// Offset-based pagination; an absent offset means the first page.
    #[serde(rename = "offset")]
    Offset {
        /// Number of rows to skip.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<u64>,
    },
    /// Cursor-based pagination; an absent token means the first page.
    #[serde(rename = "cursor")]
    Cursor {
        /// Continuation token from a previous response.
        #[serde(default, rename = "nextCursor", skip_serializing_if = "Option::is_none")]
        next_cursor: Option<String>,
    },
}

impl PaginationRequest {
    /// Offset pagination skipping `offset` rows.
    pub fn offset(offset: u64) -> Self {
        Self::Offset {
            offset: Some(offset),
        }
    }

    /// Cursor pagination continuing from a token.
    pub fn cursor(token: impl Into<String>) -> Self {
        Self::Cursor {
            next_cursor: Some(token.into()),
        }
    }

    /// Check if this is the offset variant.
    pub fn is_offset(&self) -> bool {
        matches!(self, Self::Offset { .. })
    }

    /// Check if this is the cursor variant.
    pub fn is_cursor(&self) -> bool {
        matches!(self, Self::Cursor { .. })
    }

    /// Get the offset, when present.
    pub fn offset_value(&self) -> Option<u64> {
        match self {
            Self::Offset { offset } => *offset,
            Self::Cursor { .. } => None,
        }
    }

    /// Get the cursor token, when present.
    pub fn cursor_token(&self) -> Option<&str> {
        match self {
            Self::Cursor { next_cursor } => next_cursor.as_deref(),
            Self::Offset { .. } => None,
        }
    }
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self::Cursor { next_cursor: None }
    }
}

/// Build the predicate for "row is strictly after this tuple in sort order".
///
/// For keys k₁…kₙ the result is the OR over i of
/// {k₁ = v₁, …, kᵢ₋₁ = vᵢ₋₁, kᵢ ≷ vᵢ}, where the comparison on the pivot key
/// follows its sort direction (ascending keys use greater-than, descending
/// keys less-than). A key missing from the order map compares ascending.
///
/// Cursor clauses bind parameters under the reserved `cursor` prefix, which
/// no base-26 filter-group prefix can produce, so merging the result into
/// compiled filters never collides.
pub fn continue_after(tuple: &CursorTuple, order: &OrderMap) -> WhereClause {
    let mut names = ParamNames::with_prefix("cursor");
    let entries: Vec<_> = tuple.iter().collect();
    let mut groups = Vec::with_capacity(entries.len());

    for pivot in 0..entries.len() {
        let mut group = PredicateMap::new();
        for (key, value) in &entries[..pivot] {
            let bound = Bound::new(names.next(), (*value).clone());
            group.insert_column((*key).clone(), Predicate::Equals(bound));
        }

        let (key, value) = entries[pivot];
        let direction = order.get(key.as_str()).copied().unwrap_or_default();
        let bound = Bound::new(names.next(), value.clone());
        let comparison = match direction {
            SortOrder::Asc => Predicate::Gt(bound),
            SortOrder::Desc => Predicate::Lt(bound),
        };
        group.insert_column(key.clone(), comparison);
        groups.push(group);
    }

    WhereClause::any(groups)
}

/// The canonical deserialize function for [`ReadManyRequest::generate`].
///
/// Compiles the request's filter groups; in cursor mode it additionally
/// decodes the token and AND-merges the continue-after predicate. The
/// returned function is pure: it captures only the parsed groups by value.
pub fn search_deserializer(
    groups: Vec<QueryFilter>,
) -> impl Fn(&ReadManyRequest) -> QueryResult<WhereClause> {
    move |request| {
        let filters = filter::compile(&groups)?;
        match request.pagination().cursor_token() {
            Some(token) => {
                let tuple = CursorTuple::decode(token)?;
                debug!(keys = tuple.len(), "continuing search after cursor tuple");
                let after = continue_after(&tuple, request.order());
                Ok(filters.and_merge(after))
            }
            None => Ok(filters),
        }
    }
}

/// Response metadata, identically shaped for both pagination modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMetadata {
    /// The row cap the page was fetched with.
    pub take: u64,
    /// Number of rows in this page.
    pub count: u64,
    /// Total matching rows, from the caller's count query.
    pub total: u64,
    /// Token continuing after this page, or null for an empty page.
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// The paginated response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResponse<T> {
    /// The page of rows.
    pub data: Vec<T>,
    /// Page metadata.
    pub metadata: PaginationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterOperation, PredicateEntry};
    use crate::operator::FilterOperator;
    use pretty_assertions::assert_eq;

    fn order(keys: &[(&str, SortOrder)]) -> OrderMap {
        keys.iter()
            .map(|(key, direction)| (key.to_string(), *direction))
            .collect()
    }

    fn tuple(values: &[(&str, serde_json::Value)]) -> CursorTuple {
        let mut tuple = CursorTuple::new();
        for (key, value) in values {
            tuple.insert(*key, value.clone());
        }
        tuple
    }

    #[test]
    fn test_request_wire_shapes() {
        let request: PaginationRequest =
            serde_json::from_str(r#"{ "type": "offset", "offset": 30 }"#).unwrap();
        assert_eq!(request, PaginationRequest::offset(30));

        let request: PaginationRequest =
            serde_json::from_str(r#"{ "type": "cursor", "nextCursor": "abc" }"#).unwrap();
        assert_eq!(request.cursor_token(), Some("abc"));

        // Absent fields mean "first page".
        let request: PaginationRequest = serde_json::from_str(r#"{ "type": "offset" }"#).unwrap();
        assert_eq!(request.offset_value(), None);
        let request: PaginationRequest = serde_json::from_str(r#"{ "type": "cursor" }"#).unwrap();
        assert_eq!(request.cursor_token(), None);
    }

    #[test]
    fn test_continue_after_single_ascending_key() {
        let clause = continue_after(
            &tuple(&[("id", serde_json::json!(42))]),
            &order(&[("id", SortOrder::Asc)]),
        );

        let groups = clause.groups();
        assert_eq!(groups.len(), 1);
        assert!(matches!(
            groups[0].get("id"),
            Some(PredicateEntry::Column(Predicate::Gt(_)))
        ));
    }

    #[test]
    fn test_continue_after_descending_key_uses_less_than() {
        let clause = continue_after(
            &tuple(&[("created_at", serde_json::json!("2024-03-01"))]),
            &order(&[("created_at", SortOrder::Desc)]),
        );

        assert!(matches!(
            clause.groups()[0].get("created_at"),
            Some(PredicateEntry::Column(Predicate::Lt(_)))
        ));
    }

    #[test]
    fn test_continue_after_composite_key_is_tie_broken() {
        let clause = continue_after(
            &tuple(&[
                ("created_at", serde_json::json!("2024-03-01")),
                ("id", serde_json::json!(42)),
            ]),
            &order(&[("created_at", SortOrder::Asc), ("id", SortOrder::Asc)]),
        );

        let groups = clause.groups();
        assert_eq!(groups.len(), 2);

        // First branch: created_at > v₁.
        assert!(matches!(
            groups[0].get("created_at"),
            Some(PredicateEntry::Column(Predicate::Gt(_)))
        ));
        assert!(groups[0].get("id").is_none());

        // Second branch: created_at = v₁ AND id > v₂.
        assert!(matches!(
            groups[1].get("created_at"),
            Some(PredicateEntry::Column(Predicate::Equals(_)))
        ));
        assert!(matches!(
            groups[1].get("id"),
            Some(PredicateEntry::Column(Predicate::Gt(_)))
        ));
    }

    #[test]
    fn test_continue_after_empty_tuple_is_empty() {
        let clause = continue_after(&CursorTuple::new(), &OrderMap::new());
        assert!(clause.is_empty());
    }

    #[test]
    fn test_cursor_params_use_reserved_prefix() {
        let clause = continue_after(
            &tuple(&[
                ("created_at", serde_json::json!("2024-03-01")),
                ("id", serde_json::json!(42)),
            ]),
            &order(&[("created_at", SortOrder::Asc), ("id", SortOrder::Asc)]),
        );

        let mut names = clause.parameter_names();
        assert!(names.iter().all(|name| name.starts_with("cursor")));
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_deserializer_offset_mode_compiles_filters_only() {
        let mut group = QueryFilter::new();
        group.insert(
            "title".to_string(),
            FilterOperation::with_operand(FilterOperator::Like, "Question%"),
        );
        let deserialize = search_deserializer(vec![group]);

        let request = ReadManyRequest::new()
            .set_pagination_keys(["id"])
            .set_sort(SortOrder::Asc)
            .set_pagination(PaginationRequest::offset(10));

        let clause = deserialize(&request).unwrap();
        assert_eq!(clause.groups().len(), 1);
        assert!(clause.groups()[0].get("title").is_some());
    }

    #[test]
    fn test_deserializer_cursor_mode_merges_continue_after() {
        let mut group = QueryFilter::new();
        group.insert(
            "title".to_string(),
            FilterOperation::with_operand(FilterOperator::Like, "Question%"),
        );
        let deserialize = search_deserializer(vec![group]);

        let mut last_row = CursorTuple::new();
        last_row.insert("id", serde_json::json!(42));
        let request = ReadManyRequest::new()
            .set_pagination_keys(["id"])
            .set_sort(SortOrder::Asc)
            .set_pagination(PaginationRequest::cursor(last_row.encode()));

        let clause = deserialize(&request).unwrap();
        let group = &clause.groups()[0];
        assert!(group.get("title").is_some());
        assert!(matches!(
            group.get("id"),
            Some(PredicateEntry::Column(Predicate::Gt(_)))
        ));
    }

    #[test]
    fn test_deserializer_rejects_malformed_cursor() {
        let deserialize = search_deserializer(Vec::new());
        let request = ReadManyRequest::new()
            .set_pagination_keys(["id"])
            .set_sort(SortOrder::Asc)
            .set_pagination(PaginationRequest::cursor("!!not-a-token!!"));

        let err = deserialize(&request).unwrap_err();
        assert!(err.is_malformed_cursor());
    }

    #[test]
    fn test_metadata_wire_shape() {
        let metadata = PaginationMetadata {
            take: 20,
            count: 0,
            total: 0,
            next_cursor: None,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "take": 20, "count": 0, "total": 0, "nextCursor": null })
        );
    }
}
