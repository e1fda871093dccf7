//! SQL generation from table definitions and query descriptions.
//!
//! Money and timestamps are stored as TEXT (decimal string and RFC 3339 with
//! the caller's offset), so date-only filters compare the first ten
//! characters and ordering casts back to the real type.

use flashreport_core::{
    query::{Predicate, Query},
    schema::{ColumnDef, ACTIVE_COLUMN},
    ColumnKind, Record, StorageError, TableDef, Value,
};
use time::Date;

/// A statement plus its positional parameters, each tagged with the column
/// kind that decides how it is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(ColumnKind, Value)>,
}

impl Statement {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn bind(&mut self, kind: ColumnKind, value: Value) -> String {
        self.params.push((kind, value));
        format!("${}", self.params.len())
    }
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text | ColumnKind::Money | ColumnKind::Timestamp => "TEXT",
        ColumnKind::Int => "BIGINT",
        ColumnKind::Bool => "BOOLEAN",
    }
}

pub fn date_to_str(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

pub fn create_table(def: &TableDef) -> String {
    let columns: Vec<String> = def
        .columns
        .iter()
        .map(|c| {
            let mut col = format!("\"{}\" {}", c.name, sql_type(c.kind));
            if c.name == def.primary_key {
                col.push_str(" PRIMARY KEY");
            } else if !c.nullable {
                col.push_str(" NOT NULL");
            }
            col
        })
        .collect();

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        def.name,
        columns.join(",\n    ")
    );
    for key in def.unique_keys {
        let quoted: Vec<String> = key.iter().map(|c| format!("\"{}\"", c)).collect();
        sql.push_str(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_{}_{} ON {} ({});\n",
            def.name,
            key.join("_"),
            def.name,
            quoted.join(", ")
        ));
    }
    sql
}

fn column<'a>(def: &'a TableDef, name: &str) -> Result<&'a ColumnDef, StorageError> {
    def.column(name)
        .ok_or_else(|| StorageError::Serialization(format!("unknown column {}.{}", def.name, name)))
}

fn column_list(def: &TableDef, alias: &str) -> Vec<String> {
    def.columns
        .iter()
        .map(|c| format!("{}.\"{}\"", alias, c.name))
        .collect()
}

fn returning(def: &TableDef) -> String {
    let cols: Vec<String> = def.columns.iter().map(|c| format!("\"{}\"", c.name)).collect();
    format!(" RETURNING {}", cols.join(", "))
}

pub enum Conflict {
    Fail,
    Ignore,
    Overwrite,
}

pub fn insert(def: &TableDef, record: &Record, conflict: Conflict) -> Result<Statement, StorageError> {
    let mut stmt = Statement::new();
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    for (name, value) in record.iter() {
        let col = column(def, name)?;
        names.push(format!("\"{}\"", col.name));
        placeholders.push(stmt.bind(col.kind, value.clone()));
    }

    stmt.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        def.name,
        names.join(", "),
        placeholders.join(", ")
    );
    match conflict {
        Conflict::Fail => stmt.sql.push_str(&returning(def)),
        Conflict::Ignore => stmt
            .sql
            .push_str(&format!(" ON CONFLICT (\"{}\") DO NOTHING", def.primary_key)),
        Conflict::Overwrite => {
            let updates: Vec<String> = record
                .iter()
                .filter(|(name, _)| name.as_ref() != def.primary_key)
                .map(|(name, _)| format!("\"{}\" = EXCLUDED.\"{}\"", name, name))
                .collect();
            if updates.is_empty() {
                stmt.sql
                    .push_str(&format!(" ON CONFLICT (\"{}\") DO NOTHING", def.primary_key));
            } else {
                stmt.sql.push_str(&format!(
                    " ON CONFLICT (\"{}\") DO UPDATE SET {}",
                    def.primary_key,
                    updates.join(", ")
                ));
            }
            stmt.sql.push_str(&returning(def));
        }
    }
    Ok(stmt)
}

pub fn update(def: &TableDef, id: &str, patch: &Record) -> Result<Statement, StorageError> {
    let mut stmt = Statement::new();
    let mut sets = Vec::new();
    for (name, value) in patch.iter() {
        let col = column(def, name)?;
        let placeholder = stmt.bind(col.kind, value.clone());
        sets.push(format!("\"{}\" = {}", col.name, placeholder));
    }
    let pk = stmt.bind(ColumnKind::Text, Value::from(id));
    stmt.sql = if sets.is_empty() {
        format!("SELECT 1 FROM {} WHERE \"{}\" = {}", def.name, def.primary_key, pk)
    } else {
        format!(
            "UPDATE {} SET {} WHERE \"{}\" = {}",
            def.name,
            sets.join(", "),
            def.primary_key,
            pk
        )
    };
    Ok(stmt)
}

pub fn delete(def: &TableDef, id: &str) -> Statement {
    let mut stmt = Statement::new();
    let pk = stmt.bind(ColumnKind::Text, Value::from(id));
    stmt.sql = if def.soft_delete {
        format!(
            "UPDATE {} SET \"{}\" = FALSE WHERE \"{}\" = {}",
            def.name, ACTIVE_COLUMN, def.primary_key, pk
        )
    } else {
        format!("DELETE FROM {} WHERE \"{}\" = {}", def.name, def.primary_key, pk)
    };
    stmt
}

pub fn select(query: &Query) -> Result<Statement, StorageError> {
    let def = query.table.def();
    let mut stmt = Statement::new();

    let mut columns = column_list(def, "t0");
    let mut from = format!("{} t0", def.name);
    for (i, join) in query.joins.iter().enumerate() {
        let alias = format!("j{}", i + 1);
        let join_def = join.table.def();
        column(def, join.foreign_key)?;
        columns.extend(column_list(join_def, &alias));
        from.push_str(&format!(
            " LEFT JOIN {} {} ON {}.\"{}\" = t0.\"{}\"",
            join_def.name, alias, alias, join_def.primary_key, join.foreign_key
        ));
    }

    let mut conditions = Vec::new();
    for filter in &query.filters {
        let col = column(def, filter.column)?;
        let target = format!("t0.\"{}\"", col.name);
        let condition = match &filter.predicate {
            Predicate::Eq(value) => format!("{} = {}", target, stmt.bind(col.kind, value.clone())),
            Predicate::In(values) if values.is_empty() => "FALSE".to_string(),
            Predicate::In(values) => {
                let placeholders: Vec<String> =
                    values.iter().map(|v| stmt.bind(col.kind, v.clone())).collect();
                format!("{} IN ({})", target, placeholders.join(", "))
            }
            Predicate::IsNull => format!("{} IS NULL", target),
            Predicate::OnOrAfterDate(d) => format!(
                "substr({}, 1, 10) >= {}",
                target,
                stmt.bind(ColumnKind::Text, Value::from(date_to_str(*d)))
            ),
            Predicate::OnOrBeforeDate(d) => format!(
                "substr({}, 1, 10) <= {}",
                target,
                stmt.bind(ColumnKind::Text, Value::from(date_to_str(*d)))
            ),
        };
        conditions.push(condition);
    }

    let mut order = Vec::new();
    for o in &query.order_by {
        let col = column(def, o.column)?;
        let expr = match col.kind {
            ColumnKind::Timestamp => format!("CAST(t0.\"{}\" AS TIMESTAMPTZ)", col.name),
            ColumnKind::Money => format!("CAST(t0.\"{}\" AS NUMERIC)", col.name),
            _ => format!("t0.\"{}\"", col.name),
        };
        order.push(if o.descending { format!("{} DESC", expr) } else { expr });
    }

    stmt.sql = format!("SELECT {} FROM {}", columns.join(", "), from);
    if !conditions.is_empty() {
        stmt.sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
    }
    if !order.is_empty() {
        stmt.sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(limit) = query.limit {
        stmt.sql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashreport_core::Table;
    use time::macros::date;

    #[test]
    fn test_create_table_declares_unique_sequence_index() {
        let ddl = create_table(Table::CashMovements.def());
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS cash_movements"));
        assert!(ddl.contains("\"id\" TEXT PRIMARY KEY"));
        assert!(ddl.contains("\"sequence_number\" BIGINT NOT NULL"));
        assert!(ddl.contains("\"point_of_sale_id\" TEXT,") || ddl.contains("\"point_of_sale_id\" TEXT\n"));
        assert!(ddl.contains(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_cash_movements_business_unit_id_sequence_number \
             ON cash_movements (\"business_unit_id\", \"sequence_number\");"
        ));
    }

    #[test]
    fn test_select_uses_left_joins_and_date_prefix() {
        let query = Query::new(Table::CashMovements)
            .eq("business_unit_id", "bu1")
            .filter("transaction_date", Predicate::OnOrAfterDate(date!(2024 - 03 - 01)))
            .left_join(Table::Categories, "category_id", "category")
            .order_desc("transaction_date")
            .limit(10);
        let stmt = select(&query).unwrap();
        assert!(stmt.sql.contains("LEFT JOIN movement_categories j1 ON j1.\"id\" = t0.\"category_id\""));
        assert!(!stmt.sql.contains("INNER JOIN"));
        assert!(stmt.sql.contains("WHERE t0.\"business_unit_id\" = $1 AND substr(t0.\"transaction_date\", 1, 10) >= $2"));
        assert!(stmt.sql.ends_with("ORDER BY CAST(t0.\"transaction_date\" AS TIMESTAMPTZ) DESC LIMIT 10"));
        assert_eq!(stmt.params[1], (ColumnKind::Text, Value::from("2024-03-01")));
    }

    #[test]
    fn test_soft_delete_is_an_update() {
        let stmt = delete(Table::BusinessUnits.def(), "bu1");
        assert_eq!(stmt.sql, "UPDATE business_units SET \"is_active\" = FALSE WHERE \"id\" = $1");
        let stmt = delete(Table::AppConfig.def(), "theme");
        assert_eq!(stmt.sql, "DELETE FROM app_config WHERE \"key\" = $1");
    }

    #[test]
    fn test_upsert_overwrites_non_key_columns() {
        let record = Record::new().with("key", "theme").with("value", "dark");
        let stmt = insert(Table::AppConfig.def(), &record, Conflict::Overwrite).unwrap();
        assert!(stmt
            .sql
            .starts_with("INSERT INTO app_config (\"key\", \"value\") VALUES ($1, $2) ON CONFLICT (\"key\") DO UPDATE SET \"value\" = EXCLUDED.\"value\""));
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let record = Record::new().with("id", "x").with("nickname", "y");
        assert!(insert(Table::Partners.def(), &record, Conflict::Fail).is_err());
    }
}
