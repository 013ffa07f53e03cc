//! Common types used in plan building.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Get the opposite sort order.
    pub fn reversed(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Asc
    }
}

/// Per-column sort directions, in application order.
///
/// When the order is derived from the pagination keys via a uniform sort,
/// key order here matches pagination-key order; that ordering also defines
/// the cursor tuple layout.
pub type OrderMap = IndexMap<String, SortOrder>;

/// One entry in an object-shaped selection: either a column flag or a
/// one-level relation selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectEntry {
    /// Select (or skip) a single column.
    Column(bool),
    /// Select columns of a related entity.
    Relation(IndexMap<String, bool>),
}

impl SelectEntry {
    /// Check if this entry selects a relation.
    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Relation(_))
    }
}

/// Object-shaped selection: column/relation name to selection entry.
pub type SelectShape = IndexMap<String, SelectEntry>;

/// Field selection for the compiled plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select {
    /// Select all columns.
    All,
    /// Select an explicit column list.
    Columns(Vec<String>),
    /// Select an explicit object shape, allowing relation-nested selection.
    Shape(SelectShape),
}

impl Select {
    /// Check if this selects all columns.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Get the column list, if this is a list selection.
    pub fn columns(&self) -> Option<&[String]> {
        match self {
            Self::Columns(columns) => Some(columns),
            _ => None,
        }
    }

    /// Get the object shape, if this is a shaped selection.
    pub fn shape(&self) -> Option<&SelectShape> {
        match self {
            Self::Shape(shape) => Some(shape),
            _ => None,
        }
    }
}

impl Default for Select {
    fn default() -> Self {
        Self::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_sql() {
        assert_eq!(SortOrder::Asc.as_sql(), "ASC");
        assert_eq!(SortOrder::Desc.as_sql(), "DESC");
        assert_eq!(SortOrder::Asc.reversed(), SortOrder::Desc);
    }

    #[test]
    fn test_sort_order_wire_form() {
        let order: SortOrder = serde_json::from_str("\"DESC\"").unwrap();
        assert_eq!(order, SortOrder::Desc);
        assert_eq!(serde_json::to_string(&SortOrder::Asc).unwrap(), "\"ASC\"");
    }

    #[test]
    fn test_select_shape_deserializes_nested() {
        let shape: SelectShape =
            serde_json::from_str(r#"{ "a": true, "rel": { "b": true, "c": false } }"#).unwrap();
        assert_eq!(shape.get("a"), Some(&SelectEntry::Column(true)));
        assert!(shape.get("rel").unwrap().is_relation());
    }

    #[test]
    fn test_select_default_is_all() {
        assert!(Select::default().is_all());
        assert!(Select::Columns(vec!["id".into()]).columns().is_some());
    }
}
