//! Conversion of raw wire rows into the normalized row model.
//!
//! Parsing is pure and infallible: statements project arbitrary column sets,
//! so the parser tolerates heterogeneous, missing, and surplus cells rather
//! than rejecting a row. A missing cell normalizes to `Null`; a cell without a
//! known column name gets a positional fallback name.

use crate::streamlens::api::models::RawResultItem;
use crate::streamlens::results::types::{ChangeOp, ParsedRow, RowValue};
use crate::streamlens::statement::ResultSchema;
use serde_json::Value;

pub fn parse_page(items: &[RawResultItem], schema: Option<&ResultSchema>) -> Vec<ParsedRow> {
    items.iter().map(|item| parse_item(item, schema)).collect()
}

pub fn parse_item(item: &RawResultItem, schema: Option<&ResultSchema>) -> ParsedRow {
    let op = item.op.map(ChangeOp::from_code).unwrap_or(ChangeOp::Insert);
    let schema_width = schema.map_or(0, |s| s.columns.len());
    let width = item.row.len().max(schema_width);

    let mut columns = Vec::with_capacity(width);
    for index in 0..width {
        let name = schema
            .and_then(|s| s.column_name(index))
            .map(str::to_string)
            .unwrap_or_else(|| format!("column_{}", index));
        let value = item
            .row
            .get(index)
            .map(normalize_value)
            .unwrap_or(RowValue::Null);
        columns.push((name, value));
    }
    ParsedRow { op, columns }
}

fn normalize_value(value: &Value) -> RowValue {
    match value {
        Value::Null => RowValue::Null,
        Value::Bool(b) => RowValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                RowValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                RowValue::Float(f)
            } else {
                // u64 beyond i64 range; keep the digits
                RowValue::Text(n.to_string())
            }
        }
        Value::String(s) => RowValue::Text(s.clone()),
        Value::Array(items) => RowValue::Array(items.iter().map(normalize_value).collect()),
        Value::Object(fields) => RowValue::Struct(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), normalize_value(value)))
                .collect(),
        ),
    }
}
