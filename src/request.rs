//! Read-many request assembly.
//!
//! [`ReadManyRequest`] is a fluent builder collecting everything one search
//! needs: pagination keys, where-clause, row cap, sort order, column
//! selection, relations to eager-load, and the pagination request itself.
//! [`ReadManyRequest::generate`] is the single compile step: it applies the
//! pagination strategy and finalizes the builder into an immutable
//! [`QueryPlan`], which the execution layer translates and runs. The rows it
//! returns, plus a total count, come back through [`QueryPlan::to_response`]
//! to produce the response envelope.
//!
//! ```rust
//! use prax_search::{
//!     search_deserializer, PaginationRequest, ReadManyRequest, SortOrder,
//! };
//!
//! let plan = ReadManyRequest::new()
//!     .set_pagination_keys(["id"])
//!     .set_sort(SortOrder::Asc)
//!     .set_relations(["category"])
//!     .set_take(50)
//!     .set_pagination(PaginationRequest::offset(0))
//!     .generate(search_deserializer(Vec::new()))
//!     .unwrap();
//!
//! assert_eq!(plan.skip(), Some(0));
//! assert_eq!(plan.take(), 50);
//!
//! let rows = vec![serde_json::json!({ "id": 1 })];
//! let response = plan.to_response(rows, 1);
//! assert_eq!(response.metadata.count, 1);
//! assert!(response.metadata.next_cursor.is_some());
//! ```

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::cursor::CursorTuple;
use crate::error::QueryResult;
use crate::filter::WhereClause;
use crate::pagination::{PaginationMetadata, PaginationRequest, PaginationResponse};
use crate::types::{OrderMap, Select, SelectEntry, SelectShape, SortOrder};

/// Default row cap when a request does not name one.
pub const DEFAULT_TAKE: u64 = 20;

/// A mutable builder assembling one read-many search.
#[derive(Debug, Clone)]
pub struct ReadManyRequest {
    pagination_keys: Vec<String>,
    pagination: PaginationRequest,
    where_clause: WhereClause,
    take: u64,
    sort: Option<SortOrder>,
    order: OrderMap,
    select: Select,
    select_columns: HashSet<String>,
    exclude_columns: HashSet<String>,
    relations: Vec<String>,
    with_deleted: bool,
}

impl Default for ReadManyRequest {
    fn default() -> Self {
        Self {
            pagination_keys: Vec::new(),
            pagination: PaginationRequest::default(),
            where_clause: WhereClause::none(),
            take: DEFAULT_TAKE,
            sort: None,
            order: OrderMap::new(),
            select: Select::All,
            select_columns: HashSet::new(),
            exclude_columns: HashSet::new(),
            relations: Vec::new(),
            with_deleted: false,
        }
    }
}

impl ReadManyRequest {
    /// Create a builder with the default row cap and no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the pagination keys.
    pub fn pagination_keys(&self) -> &[String] {
        &self.pagination_keys
    }

    /// Get the pagination request.
    pub fn pagination(&self) -> &PaginationRequest {
        &self.pagination
    }

    /// Get the current where-clause.
    pub fn where_clause(&self) -> &WhereClause {
        &self.where_clause
    }

    /// Get the per-column sort directions.
    pub fn order(&self) -> &OrderMap {
        &self.order
    }

    /// Get the uniform sort direction, when one was set.
    pub fn sort(&self) -> Option<SortOrder> {
        self.sort
    }

    /// Get the row cap.
    pub fn take(&self) -> u64 {
        self.take
    }

    /// Set the columns defining row identity and order.
    pub fn set_pagination_keys(
        mut self,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.pagination_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pagination request.
    pub fn set_pagination(mut self, pagination: PaginationRequest) -> Self {
        self.pagination = pagination;
        self
    }

    /// Set the where-clause explicitly.
    pub fn set_where(mut self, where_clause: WhereClause) -> Self {
        self.where_clause = where_clause;
        self
    }

    /// Set the row cap.
    pub fn set_take(mut self, take: u64) -> Self {
        self.take = take;
        self
    }

    /// Apply one sort direction to every pagination key, rebuilding the
    /// order map from the keys on each call.
    pub fn set_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self.order = self
            .pagination_keys
            .iter()
            .map(|key| (key.clone(), sort))
            .collect();
        self
    }

    /// Set an explicit per-column order map, overriding the uniform sort.
    pub fn set_order(mut self, order: OrderMap) -> Self {
        self.order = order;
        self
    }

    /// Add columns to the inclusion set. An empty input is a no-op.
    pub fn set_select_columns(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.select_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Set an explicit object-shaped selection.
    pub fn set_select(mut self, shape: SelectShape) -> Self {
        self.select = Select::Shape(shape);
        self
    }

    /// Add columns to the exclusion set. An empty input is a no-op.
    pub fn set_exclude_columns(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.exclude_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Set the relations to eager-load.
    pub fn set_relations(
        mut self,
        relations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.relations = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Include soft-deleted rows in the result.
    pub fn set_with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    /// Resolve the selection against a candidate column list.
    ///
    /// If an object-shaped selection is already set, it is filtered in place
    /// instead: excluded keys are removed at the top level and one relation
    /// level down, and a relation entry emptied by filtering is dropped.
    /// Otherwise the selection becomes the candidate columns that are not
    /// excluded and, when an inclusion set was given, are included in it.
    pub fn excluded_columns(
        mut self,
        candidates: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        if let Select::Shape(shape) = &self.select {
            let mut filtered = SelectShape::new();
            for (key, entry) in shape {
                if self.exclude_columns.contains(key) {
                    continue;
                }
                match entry {
                    SelectEntry::Column(flag) => {
                        filtered.insert(key.clone(), SelectEntry::Column(*flag));
                    }
                    SelectEntry::Relation(columns) => {
                        let kept: indexmap::IndexMap<String, bool> = columns
                            .iter()
                            .filter(|(column, _)| !self.exclude_columns.contains(*column))
                            .map(|(column, flag)| (column.clone(), *flag))
                            .collect();
                        if !kept.is_empty() {
                            filtered.insert(key.clone(), SelectEntry::Relation(kept));
                        }
                    }
                }
            }
            self.select = Select::Shape(filtered);
            return self;
        }

        let columns = candidates
            .into_iter()
            .map(Into::into)
            .filter(|column| !self.exclude_columns.contains(column))
            .filter(|column| {
                self.select_columns.is_empty() || self.select_columns.contains(column)
            })
            .collect();
        self.select = Select::Columns(columns);
        self
    }

    /// The compile step: apply the pagination strategy and finalize.
    ///
    /// With a finite offset, `deserialize` produces the where-clause and the
    /// offset becomes the plan's skip. With a present cursor token,
    /// `deserialize` produces the where-clause (merging the cursor-derived
    /// predicate) and skip is unused. Otherwise the where-clause is left as
    /// explicitly set and pagination is a no-op.
    pub fn generate<F>(mut self, deserialize: F) -> QueryResult<QueryPlan>
    where
        F: FnOnce(&Self) -> QueryResult<WhereClause>,
    {
        match self.pagination.clone() {
            PaginationRequest::Offset {
                offset: Some(offset),
            } => {
                self.where_clause = deserialize(&self)?;
                debug!(offset, take = self.take, "generated offset query plan");
                Ok(self.into_plan(Some(offset)))
            }
            PaginationRequest::Cursor {
                next_cursor: Some(_),
            } => {
                self.where_clause = deserialize(&self)?;
                debug!(take = self.take, "generated cursor query plan");
                Ok(self.into_plan(None))
            }
            _ => {
                debug!(take = self.take, "generated first-page query plan");
                Ok(self.into_plan(None))
            }
        }
    }

    fn into_plan(self, skip: Option<u64>) -> QueryPlan {
        QueryPlan {
            where_clause: self.where_clause,
            skip,
            take: self.take,
            order: self.order,
            select: self.select,
            relations: self.relations,
            with_deleted: self.with_deleted,
        }
    }
}

/// The finalized query plan for one search.
///
/// Produced by [`ReadManyRequest::generate`]; immutable from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    where_clause: WhereClause,
    skip: Option<u64>,
    take: u64,
    order: OrderMap,
    select: Select,
    relations: Vec<String>,
    with_deleted: bool,
}

impl QueryPlan {
    /// Get the where-clause.
    pub fn where_clause(&self) -> &WhereClause {
        &self.where_clause
    }

    /// Get the number of rows to skip, in offset mode.
    pub fn skip(&self) -> Option<u64> {
        self.skip
    }

    /// Get the row cap.
    pub fn take(&self) -> u64 {
        self.take
    }

    /// Get the per-column sort directions.
    pub fn order(&self) -> &OrderMap {
        &self.order
    }

    /// Get the column selection.
    pub fn select(&self) -> &Select {
        &self.select
    }

    /// Get the relations to eager-load.
    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    /// Check whether soft-deleted rows are included.
    pub fn with_deleted(&self) -> bool {
        self.with_deleted
    }

    /// Build the response envelope from the executed rows and the total
    /// matching-row count.
    ///
    /// The continuation token is the encoded key-subset of the last row, or
    /// null for an empty page. Both pagination modes produce this same
    /// metadata shape.
    pub fn to_response<T: Serialize>(&self, data: Vec<T>, total: u64) -> PaginationResponse<T> {
        let count = data.len() as u64;
        let next_cursor = data
            .last()
            .and_then(|row| serde_json::to_value(row).ok())
            .map(|row| CursorTuple::from_row(&row, self.order.keys()).encode());

        PaginationResponse {
            data,
            metadata: PaginationMetadata {
                take: self.take,
                count,
                total,
                next_cursor,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Bound, Predicate, PredicateMap};
    use pretty_assertions::assert_eq;

    fn keyed_request() -> ReadManyRequest {
        ReadManyRequest::new()
            .set_pagination_keys(["created_at", "id"])
            .set_sort(SortOrder::Asc)
    }

    fn title_clause() -> WhereClause {
        let mut map = PredicateMap::new();
        map.insert_column("title", Predicate::Equals(Bound::new("A0", "x")));
        WhereClause::Single(map)
    }

    #[test]
    fn test_default_take_policy() {
        assert_eq!(ReadManyRequest::new().take(), DEFAULT_TAKE);
        assert_eq!(DEFAULT_TAKE, 20);
    }

    #[test]
    fn test_set_sort_rebuilds_order_from_keys() {
        let request = keyed_request();
        let directions: Vec<_> = request.order().values().copied().collect();
        assert_eq!(directions, vec![SortOrder::Asc, SortOrder::Asc]);

        let request = request.set_sort(SortOrder::Desc);
        let keys: Vec<_> = request.order().keys().cloned().collect();
        assert_eq!(keys, vec!["created_at", "id"]);
        assert!(request.order().values().all(|d| *d == SortOrder::Desc));
        assert_eq!(request.sort(), Some(SortOrder::Desc));
    }

    #[test]
    fn test_explicit_order_overrides_uniform_sort() {
        let mut order = OrderMap::new();
        order.insert("id".to_string(), SortOrder::Desc);

        let request = keyed_request().set_order(order);
        assert_eq!(request.order().len(), 1);
        assert_eq!(request.order().get("id"), Some(&SortOrder::Desc));
    }

    #[test]
    fn test_excluded_columns_array_path() {
        let request = ReadManyRequest::new()
            .set_exclude_columns(["secret"])
            .excluded_columns(["id", "title", "secret"]);

        assert_eq!(
            request.select.columns(),
            Some(&["id".to_string(), "title".to_string()][..])
        );
    }

    #[test]
    fn test_excluded_columns_honors_inclusion_set() {
        let request = ReadManyRequest::new()
            .set_select_columns(["title"])
            .set_exclude_columns(["secret"])
            .excluded_columns(["id", "title", "secret"]);

        assert_eq!(request.select.columns(), Some(&["title".to_string()][..]));
    }

    #[test]
    fn test_excluded_columns_filters_object_select() {
        let shape: SelectShape = serde_json::from_str(
            r#"{ "a": true, "secret": true, "rel": { "b": true, "secret": true } }"#,
        )
        .unwrap();

        let request = ReadManyRequest::new()
            .set_select(shape)
            .set_exclude_columns(["secret"])
            .excluded_columns(Vec::<String>::new());

        let expected: SelectShape =
            serde_json::from_str(r#"{ "a": true, "rel": { "b": true } }"#).unwrap();
        assert_eq!(request.select.shape(), Some(&expected));
    }

    #[test]
    fn test_excluded_columns_drops_emptied_relation() {
        let shape: SelectShape =
            serde_json::from_str(r#"{ "a": true, "rel": { "secret": true } }"#).unwrap();

        let request = ReadManyRequest::new()
            .set_select(shape)
            .set_exclude_columns(["secret"])
            .excluded_columns(Vec::<String>::new());

        let expected: SelectShape = serde_json::from_str(r#"{ "a": true }"#).unwrap();
        assert_eq!(request.select.shape(), Some(&expected));
    }

    #[test]
    fn test_generate_offset_sets_skip() {
        let plan = keyed_request()
            .set_pagination(PaginationRequest::offset(40))
            .generate(|_| Ok(title_clause()))
            .unwrap();

        assert_eq!(plan.skip(), Some(40));
        assert_eq!(plan.where_clause(), &title_clause());
    }

    #[test]
    fn test_generate_cursor_does_not_skip() {
        let mut tuple = CursorTuple::new();
        tuple.insert("created_at", serde_json::json!("2024-03-01"));
        tuple.insert("id", serde_json::json!(7));

        let plan = keyed_request()
            .set_pagination(PaginationRequest::cursor(tuple.encode()))
            .generate(|_| Ok(title_clause()))
            .unwrap();

        assert_eq!(plan.skip(), None);
        assert_eq!(plan.where_clause(), &title_clause());
    }

    #[test]
    fn test_generate_first_page_skips_deserialize() {
        let explicit = title_clause();
        let plan = keyed_request()
            .set_where(explicit.clone())
            .set_pagination(PaginationRequest::Cursor { next_cursor: None })
            .generate(|_| panic!("deserialize must not run on a first-page fetch"))
            .unwrap();

        assert_eq!(plan.skip(), None);
        assert_eq!(plan.where_clause(), &explicit);
    }

    #[test]
    fn test_generate_absent_offset_is_first_page() {
        let plan = keyed_request()
            .set_pagination(PaginationRequest::Offset { offset: None })
            .generate(|_| panic!("deserialize must not run without a finite offset"))
            .unwrap();

        assert_eq!(plan.skip(), None);
    }

    #[test]
    fn test_to_response_empty_page() {
        let plan = keyed_request()
            .generate(|request| Ok(request.where_clause().clone()))
            .unwrap();

        let response = plan.to_response(Vec::<serde_json::Value>::new(), 0);
        assert_eq!(response.metadata.count, 0);
        assert_eq!(response.metadata.total, 0);
        assert_eq!(response.metadata.take, DEFAULT_TAKE);
        assert_eq!(response.metadata.next_cursor, None);
    }

    #[test]
    fn test_to_response_encodes_last_row_key_subset() {
        let plan = keyed_request()
            .set_take(2)
            .generate(|request| Ok(request.where_clause().clone()))
            .unwrap();

        let rows = vec![
            serde_json::json!({ "id": 1, "created_at": "2024-03-01", "title": "first" }),
            serde_json::json!({ "id": 2, "created_at": "2024-03-02", "title": "second" }),
        ];
        let response = plan.to_response(rows, 5);

        assert_eq!(response.metadata.take, 2);
        assert_eq!(response.metadata.count, 2);
        assert_eq!(response.metadata.total, 5);

        let token = response.metadata.next_cursor.expect("cursor for non-empty page");
        let tuple = CursorTuple::decode(&token).unwrap();
        assert_eq!(tuple.get("id"), Some(&serde_json::json!(2)));
        assert_eq!(tuple.get("created_at"), Some(&serde_json::json!("2024-03-02")));
        assert_eq!(tuple.len(), 2);
    }

    #[test]
    fn test_metadata_shape_is_identical_across_modes() {
        let rows = || vec![serde_json::json!({ "id": 1, "created_at": "2024-03-01" })];

        let offset_plan = keyed_request()
            .set_pagination(PaginationRequest::offset(0))
            .generate(|request| Ok(request.where_clause().clone()))
            .unwrap();
        let cursor_plan = keyed_request()
            .set_pagination(PaginationRequest::Cursor { next_cursor: None })
            .generate(|request| Ok(request.where_clause().clone()))
            .unwrap();

        let offset_response = offset_plan.to_response(rows(), 1);
        let cursor_response = cursor_plan.to_response(rows(), 1);
        assert_eq!(offset_response.metadata, cursor_response.metadata);
    }
}
