//! Normalized row model served to the host layer.
//!
//! These types are the boundary between the wire format of the results
//! endpoint and everything downstream of the manager: the buffer stores them,
//! the message protocol returns them, and the host layer renders them without
//! knowing anything about the remote API's schema shape.

use crate::streamlens::api::models::RawResultItem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Changelog operation attached to a result row.
///
/// Streaming results form a changelog rather than a static table; each row
/// carries the operation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOp {
    Insert,
    UpdateBefore,
    UpdateAfter,
    Delete,
}

impl ChangeOp {
    /// Decode the wire op code. Unknown codes normalize to `Insert`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ChangeOp::Insert,
            1 => ChangeOp::UpdateBefore,
            2 => ChangeOp::UpdateAfter,
            3 => ChangeOp::Delete,
            _ => ChangeOp::Insert,
        }
    }

    /// Short changelog symbol, e.g. for table rendering.
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "+I",
            ChangeOp::UpdateBefore => "-U",
            ChangeOp::UpdateAfter => "+U",
            ChangeOp::Delete => "-D",
        }
    }
}

/// Normalized value of one result cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Array(Vec<RowValue>),
    Struct(Vec<(String, RowValue)>),
}

impl fmt::Display for RowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValue::Null => write!(f, "NULL"),
            RowValue::Boolean(b) => write!(f, "{}", b),
            RowValue::Integer(i) => write!(f, "{}", i),
            RowValue::Float(v) => write!(f, "{}", v),
            RowValue::Text(s) => write!(f, "{}", s),
            RowValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            RowValue::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// One parsed result row, before the buffer assigns its sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub op: ChangeOp,
    pub columns: Vec<(String, RowValue)>,
}

/// A buffered row with its stable pagination identity.
///
/// `seq` is assigned at append time, increases monotonically, and identifies
/// the row for pagination. It is not the row's business key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub seq: u64,
    pub op: ChangeOp,
    pub columns: Vec<(String, RowValue)>,
}

impl NormalizedRow {
    /// Look up a cell by column name.
    pub fn value(&self, name: &str) -> Option<&RowValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }
}

/// One fetch response from the results endpoint: the raw rows plus the
/// continuation marker. `next_token == None` means the server has no further
/// pages for this statement.
#[derive(Debug, Clone)]
pub struct ResultPage {
    pub items: Vec<RawResultItem>,
    pub next_token: Option<String>,
}

impl ResultPage {
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }

    /// A page can be metadata-only (no rows yet) while the query warms up.
    pub fn is_data_bearing(&self) -> bool {
        !self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_op_from_code() {
        assert_eq!(ChangeOp::from_code(0), ChangeOp::Insert);
        assert_eq!(ChangeOp::from_code(1), ChangeOp::UpdateBefore);
        assert_eq!(ChangeOp::from_code(2), ChangeOp::UpdateAfter);
        assert_eq!(ChangeOp::from_code(3), ChangeOp::Delete);
        assert_eq!(ChangeOp::from_code(42), ChangeOp::Insert);
    }

    #[test]
    fn test_row_value_display() {
        assert_eq!(RowValue::Null.to_string(), "NULL");
        assert_eq!(RowValue::Integer(42).to_string(), "42");
        assert_eq!(
            RowValue::Array(vec![RowValue::Integer(1), RowValue::Text("a".into())]).to_string(),
            "[1, a]"
        );
        assert_eq!(
            RowValue::Struct(vec![("k".into(), RowValue::Boolean(true))]).to_string(),
            "{k: true}"
        );
    }

    #[test]
    fn test_row_value_lookup() {
        let row = NormalizedRow {
            seq: 0,
            op: ChangeOp::Insert,
            columns: vec![
                ("id".to_string(), RowValue::Integer(7)),
                ("name".to_string(), RowValue::Text("seven".to_string())),
            ],
        };
        assert_eq!(row.value("id"), Some(&RowValue::Integer(7)));
        assert_eq!(row.value("missing"), None);
    }
}
