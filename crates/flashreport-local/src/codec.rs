//! JSON layout of the persisted blob: one object keyed by table name, each
//! value an ordered list of row objects. Decoding is driven by the column
//! kinds in the schema, so unknown tables and columns are skipped and missing
//! columns fall back to defaults.

use std::{collections::BTreeMap, str::FromStr, sync::Arc};

use flashreport_core::{
    schema::{ColumnDef, ACTIVE_COLUMN},
    ColumnKind, Record, StorageError, Table, Value,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value as Json};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub type Tables = BTreeMap<Table, Vec<Record>>;

pub fn encode(tables: &Tables) -> Result<String, StorageError> {
    let mut root = Map::new();
    for (table, rows) in tables {
        let rows = rows
            .iter()
            .map(encode_record)
            .collect::<Result<Vec<_>, _>>()?;
        root.insert(table.name().to_string(), Json::Array(rows));
    }
    serde_json::to_string(&Json::Object(root)).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn encode_record(record: &Record) -> Result<Json, StorageError> {
    let mut obj = Map::new();
    for (column, value) in record.iter() {
        obj.insert(column.to_string(), encode_value(value)?);
    }
    Ok(Json::Object(obj))
}

fn encode_value(value: &Value) -> Result<Json, StorageError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Money(m) => Json::String(m.to_string()),
        Value::Text(s) => Json::String(s.to_string()),
        Value::Timestamp(ts) => Json::String(
            ts.format(&Rfc3339)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        ),
    })
}

pub fn decode(raw: &str) -> Result<Tables, StorageError> {
    let root: Json = serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let root = match root {
        Json::Object(map) => map,
        _ => return Err(StorageError::Serialization("blob root is not an object".to_string())),
    };

    let mut tables = Tables::new();
    for (name, rows) in root {
        let table = match Table::from_name(&name) {
            Some(t) => t,
            None => {
                tracing::debug!(table = %name, "Ignoring unknown table in local blob");
                continue;
            }
        };
        let rows = match rows {
            Json::Array(rows) => rows,
            _ => {
                tracing::warn!(table = %name, "Table in local blob is not a list, ignoring it");
                continue;
            }
        };
        let decoded: Vec<Record> = rows
            .iter()
            .filter_map(|row| decode_record(table, row))
            .collect();
        tables.insert(table, decoded);
    }
    Ok(tables)
}

fn decode_record(table: Table, row: &Json) -> Option<Record> {
    let obj = row.as_object()?;
    let def = table.def();
    let mut record = Record::new();
    for column in def.columns {
        let value = match obj.get(column.name) {
            Some(json) => decode_value(column.kind, json),
            None => Value::Null,
        };
        let value = if value.is_null() && !column.nullable {
            default_value(column)
        } else {
            value
        };
        record.set(column.name, value);
    }
    // Rows written before the audit column existed take their business date.
    if def.column("created_at").is_some() && record.get("created_at").is_null() {
        let fallback = record.get("transaction_date").clone();
        record.set("created_at", fallback);
    }
    match record.text(def.primary_key) {
        Some(pk) if !pk.is_empty() => Some(record),
        _ => {
            tracing::warn!(table = %table, "Dropping row without primary key from local blob");
            None
        }
    }
}

fn decode_value(kind: ColumnKind, json: &Json) -> Value {
    match (kind, json) {
        (_, Json::Null) => Value::Null,
        (ColumnKind::Text, Json::String(s)) => Value::Text(Arc::from(s.as_str())),
        (ColumnKind::Text, Json::Number(n)) => Value::from(n.to_string()),
        (ColumnKind::Text, Json::Bool(b)) => Value::from(b.to_string()),
        (ColumnKind::Int, Json::Number(n)) => n.as_i64().map(Value::Int).unwrap_or(Value::Null),
        (ColumnKind::Int, Json::String(s)) => s.parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
        (ColumnKind::Bool, Json::Bool(b)) => Value::Bool(*b),
        (ColumnKind::Bool, Json::Number(n)) => Value::Bool(n.as_i64().unwrap_or(0) != 0),
        (ColumnKind::Bool, Json::String(s)) => match s.as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::Null,
        },
        (ColumnKind::Money, Json::String(s)) => Decimal::from_str(s).map(Value::Money).unwrap_or(Value::Null),
        (ColumnKind::Money, Json::Number(n)) => Decimal::from_str(&n.to_string())
            .map(Value::Money)
            .unwrap_or(Value::Null),
        (ColumnKind::Timestamp, Json::String(s)) => OffsetDateTime::parse(s, &Rfc3339)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn default_value(column: &ColumnDef) -> Value {
    match column.kind {
        ColumnKind::Text => Value::from(""),
        ColumnKind::Int => Value::Int(0),
        ColumnKind::Bool => Value::Bool(column.name == ACTIVE_COLUMN),
        ColumnKind::Money => Value::Money(Decimal::ZERO),
        ColumnKind::Timestamp => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    #[test]
    fn test_encoded_blob_is_keyed_by_table_name() {
        let mut tables = Tables::new();
        tables.insert(
            Table::CashMovements,
            vec![Record::new()
                .with("id", "m1")
                .with("amount", dec!(12.50))
                .with("transaction_date", datetime!(2024-02-01 09:15 -03:00))],
        );
        let raw = encode(&tables).unwrap();
        let json: Json = serde_json::from_str(&raw).unwrap();
        let row = &json["cash_movements"][0];
        assert_eq!(row["amount"], Json::String("12.50".to_string()));
        assert_eq!(row["transaction_date"], Json::String("2024-02-01T09:15:00-03:00".to_string()));
    }

    #[test]
    fn test_decode_tolerates_unknown_and_missing_keys() {
        let raw = r##"{
            "legacy_table": [{"id": "x"}],
            "business_units": [
                {"id": "bu1", "name": "North", "color": "#fff", "display_order": "2", "extra": 1},
                {"name": "no id"}
            ]
        }"##;
        let tables = decode(raw).unwrap();
        assert_eq!(tables.len(), 1);
        let units = &tables[&Table::BusinessUnits];
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].int("display_order"), Some(2));
        assert_eq!(units[0].bool("is_active"), Some(true));
        assert!(units[0].get("location").is_null());
        assert!(!units[0].contains("extra"));
    }

    #[test]
    fn test_missing_created_at_takes_transaction_date() {
        let raw = r#"{
            "cash_movements": [
                {"id": "m1", "business_unit_id": "bu-main", "category_id": "cat-sales",
                 "movement_type": "CR", "amount": "5", "sequence_number": 1,
                 "transaction_date": "2023-11-02T10:00:00Z"}
            ]
        }"#;
        let tables = decode(raw).unwrap();
        let row = &tables[&Table::CashMovements][0];
        assert_eq!(row.get("created_at"), &Value::Timestamp(datetime!(2023-11-02 10:00 UTC)));
    }

    #[test]
    fn test_decode_rejects_non_object_root() {
        assert!(decode("[1, 2, 3]").is_err());
        assert!(decode("not json").is_err());
    }
}
