//! Comparison operators and their operand-arity rules.
//!
//! The operator set is closed: every incoming filter names one of these
//! operators by its wire token, and each operator maps to exactly one
//! predicate-construction rule in the filter compiler.
//!
//! ```rust
//! use prax_search::{FilterOperator, OperandArity};
//!
//! let op: FilterOperator = "BETWEEN".parse().unwrap();
//! assert_eq!(op, FilterOperator::Between);
//! assert_eq!(op.arity(), OperandArity::Pair);
//! assert_eq!(op.as_str(), "BETWEEN");
//!
//! assert!("~=".parse::<FilterOperator>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// A comparison operator in a filter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Exact match (`=`).
    #[serde(rename = "=")]
    Equals,
    /// Negated exact match (`!=`).
    #[serde(rename = "!=")]
    NotEquals,
    /// Range comparison (`>`).
    #[serde(rename = ">")]
    GreaterThan,
    /// Range comparison (`>=`).
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Range comparison (`<`).
    #[serde(rename = "<")]
    LessThan,
    /// Range comparison (`<=`).
    #[serde(rename = "<=")]
    LessThanOrEqual,
    /// Case-sensitive pattern match.
    #[serde(rename = "LIKE")]
    Like,
    /// Case-insensitive pattern match.
    #[serde(rename = "ILIKE")]
    ILike,
    /// Structural key-existence test (`?`), backend-defined fragment.
    #[serde(rename = "?")]
    JsonbExists,
    /// Structural containment test (`@>`), backend-defined fragment.
    #[serde(rename = "@>")]
    JsonbContains,
    /// JSON containment test (`JSON_CONTAINS`), backend-defined fragment.
    #[serde(rename = "JSON_CONTAINS")]
    JsonContains,
    /// Inclusive range test over a 2-element operand.
    #[serde(rename = "BETWEEN")]
    Between,
    /// Membership test against an operand list.
    #[serde(rename = "IN")]
    In,
    /// Null test; takes no operand.
    #[serde(rename = "IS_NULL")]
    IsNull,
}

/// How many operand values an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandArity {
    /// No operand (`IS_NULL`).
    None,
    /// A single scalar operand.
    One,
    /// Exactly two values (`BETWEEN`).
    Pair,
    /// A list of values (`IN`).
    Many,
}

impl FilterOperator {
    /// All supported operators, in wire-token order.
    pub const ALL: [FilterOperator; 14] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Like,
        Self::ILike,
        Self::JsonbExists,
        Self::JsonbContains,
        Self::JsonContains,
        Self::Between,
        Self::In,
        Self::IsNull,
    ];

    /// Get the wire token for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Like => "LIKE",
            Self::ILike => "ILIKE",
            Self::JsonbExists => "?",
            Self::JsonbContains => "@>",
            Self::JsonContains => "JSON_CONTAINS",
            Self::Between => "BETWEEN",
            Self::In => "IN",
            Self::IsNull => "IS_NULL",
        }
    }

    /// Get the operand arity for this operator.
    pub fn arity(&self) -> OperandArity {
        match self {
            Self::IsNull => OperandArity::None,
            Self::Between => OperandArity::Pair,
            Self::In => OperandArity::Many,
            _ => OperandArity::One,
        }
    }

    /// Check whether this operator requires an operand.
    pub fn requires_operand(&self) -> bool {
        self.arity() != OperandArity::None
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = QueryError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == token)
            .ok_or_else(|| QueryError::unsupported_operator(token))
    }
}
