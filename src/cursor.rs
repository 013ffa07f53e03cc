//! Opaque cursor tokens for continuing a paginated scan.
//!
//! A cursor identifies "resume after this row" as the ordered tuple of the
//! row's pagination-key values. The token is the URL-safe base64 of the
//! tuple's JSON form; clients treat it as opaque.
//!
//! The codec is lossless: `decode(encode(x)) == x` for every representable
//! tuple. The empty tuple encodes to the empty-string sentinel (a search
//! that returned no rows has nothing to resume after), and decoding the
//! sentinel yields the empty tuple back.
//!
//! ```rust
//! use prax_search::CursorTuple;
//!
//! let mut tuple = CursorTuple::new();
//! tuple.insert("created_at", serde_json::json!("2024-03-01T00:00:00Z"));
//! tuple.insert("id", serde_json::json!(42));
//!
//! let token = tuple.encode();
//! assert_eq!(CursorTuple::decode(&token).unwrap(), tuple);
//!
//! assert_eq!(CursorTuple::new().encode(), "");
//! assert!(CursorTuple::decode("not a token!").is_err());
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// The ordered pagination-key values identifying a row's position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CursorTuple {
    values: IndexMap<String, serde_json::Value>,
}

impl CursorTuple {
    /// Create an empty tuple.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the key-subset of a row, in key order.
    ///
    /// A key the row does not carry becomes JSON null, preserving the
    /// tuple's arity.
    pub fn from_row<'a>(
        row: &serde_json::Value,
        keys: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let values = keys
            .into_iter()
            .map(|key| {
                let value = row.get(key).cloned().unwrap_or(serde_json::Value::Null);
                (key.clone(), value)
            })
            .collect();
        Self { values }
    }

    /// Insert a key value, keeping insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Check if the tuple has no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate over the keyed values in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.values.iter()
    }

    /// Serialize the tuple into an opaque, URL-safe token.
    ///
    /// The empty tuple yields the empty-string sentinel.
    pub fn encode(&self) -> String {
        if self.values.is_empty() {
            return String::new();
        }
        // IndexMap serialization is ordered, so the payload is deterministic.
        match serde_json::to_vec(self) {
            Ok(payload) => URL_SAFE_NO_PAD.encode(payload),
            Err(_) => String::new(),
        }
    }

    /// Decode a token back into the tuple it was encoded from.
    ///
    /// The empty-string sentinel decodes to the empty tuple; anything else
    /// that fails to decode is a malformed cursor, never a silent first page.
    pub fn decode(token: &str) -> QueryResult<Self> {
        if token.is_empty() {
            return Ok(Self::new());
        }
        let payload = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|err| QueryError::malformed_cursor("invalid base64").with_source(err))?;
        serde_json::from_slice(&payload)
            .map_err(|err| QueryError::malformed_cursor("invalid payload").with_source(err))
    }
}

impl<'a> IntoIterator for &'a CursorTuple {
    type Item = (&'a String, &'a serde_json::Value);
    type IntoIter = indexmap::map::Iter<'a, String, serde_json::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
