//! # prax-search
//!
//! Declarative search-to-query compiler and pagination engine for relational
//! data access.
//!
//! Client code submits filter groups (field, operator, operand, optional
//! negation, optional `relation.column` path) plus pagination parameters,
//! and this crate deterministically compiles them into a backend-neutral
//! query plan: a predicate tree with statement-unique parameter names, plus
//! ordering, limit, and selection clauses. On the response side it derives
//! the opaque continuation token from the last returned row. It never
//! executes anything; a persistence driver consumes the plan.
//!
//! ## Filters
//!
//! Groups combine with OR, fields within a group with AND:
//!
//! ```rust
//! use prax_search::{compile, FilterOperation, FilterOperator, QueryFilter};
//!
//! let mut group = QueryFilter::new();
//! group.insert(
//!     "category.name".to_string(),
//!     FilterOperation::with_operand(FilterOperator::Equals, "General"),
//! );
//! group.insert(
//!     "views".to_string(),
//!     FilterOperation::with_operand(FilterOperator::Between, vec![10i64, 100i64]),
//! );
//!
//! let clause = compile(&[group]).unwrap();
//! // Relation-qualified fields nest; every bound value has a unique name.
//! assert_eq!(clause.parameter_names(), vec!["A0", "A1", "A2"]);
//! ```
//!
//! ## Building a plan
//!
//! The read-many builder assembles a search and finalizes it in one compile
//! step; [`search_deserializer`] supplies the where-clause, merging the
//! cursor continuation predicate when one applies:
//!
//! ```rust
//! use prax_search::{
//!     search_deserializer, FilterOperation, FilterOperator, PaginationRequest,
//!     QueryFilter, ReadManyRequest, SortOrder,
//! };
//!
//! let mut group = QueryFilter::new();
//! group.insert(
//!     "title".to_string(),
//!     FilterOperation::with_operand(FilterOperator::Like, "Question Title"),
//! );
//!
//! let plan = ReadManyRequest::new()
//!     .set_pagination_keys(["id"])
//!     .set_sort(SortOrder::Asc)
//!     .set_relations(["category", "writer"])
//!     .set_pagination(PaginationRequest::offset(0))
//!     .generate(search_deserializer(vec![group]))
//!     .unwrap();
//!
//! assert_eq!(plan.skip(), Some(0));
//! assert_eq!(plan.relations(), ["category", "writer"]);
//! ```
//!
//! ## Responses and cursors
//!
//! Executed rows plus a total count become the response envelope; the
//! metadata's `nextCursor` encodes the last row's pagination-key tuple:
//!
//! ```rust
//! use prax_search::{CursorTuple, ReadManyRequest, SortOrder};
//!
//! let plan = ReadManyRequest::new()
//!     .set_pagination_keys(["id"])
//!     .set_sort(SortOrder::Asc)
//!     .generate(|request| Ok(request.where_clause().clone()))
//!     .unwrap();
//!
//! let rows = vec![serde_json::json!({ "id": 7, "title": "Question Title" })];
//! let response = plan.to_response(rows, 1);
//!
//! let token = response.metadata.next_cursor.unwrap();
//! let tuple = CursorTuple::decode(&token).unwrap();
//! assert_eq!(tuple.get("id"), Some(&serde_json::json!(7)));
//! ```
//!
//! ## Error Handling
//!
//! Compilation errors carry a code and are detected before anything reaches
//! the execution layer:
//!
//! ```rust
//! use prax_search::{CursorTuple, ErrorCode};
//!
//! let err = CursorTuple::decode("!!bad!!").unwrap_err();
//! assert_eq!(err.code, ErrorCode::MalformedCursor);
//! ```

pub mod cursor;
pub mod error;
pub mod filter;
pub mod operator;
pub mod pagination;
pub mod request;
pub mod types;

pub use cursor::CursorTuple;
pub use error::{ErrorCode, QueryError, QueryResult};
pub use filter::{
    Bound, Containment, FieldPath, FilterOperation, FilterValue, Predicate, PredicateEntry,
    PredicateMap, QueryFilter, WhereClause, compile, compile_group, group_prefix,
};
pub use operator::{FilterOperator, OperandArity};
pub use pagination::{
    PaginationMetadata, PaginationRequest, PaginationResponse, continue_after,
    search_deserializer,
};
pub use request::{DEFAULT_TAKE, QueryPlan, ReadManyRequest};
pub use types::{OrderMap, Select, SelectEntry, SelectShape, SortOrder};
