use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use flashreport_core::{
    schema::ColumnDef, ColumnKind, Query, Record, Row, Rows, StorageBackend, StorageError, Table, TableDef,
    TransactionGate, TransactionId, Value,
};
use postgres::{error::SqlState, types::ToSql, Client, Config, NoTls};
use rust_decimal::Decimal;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::sql::{self, Conflict, Statement};

#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub connect_timeout: Duration,
    pub statement_timeout: Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_secs(15),
        }
    }
}

/// Remote variant: a hosted PostgreSQL database reached through the blocking
/// `postgres` client. Calls are serialized on one connection. While a
/// transaction is open, statements from other threads wait at the gate so
/// they never run inside it.
///
/// Locks are always taken gate first, then client.
pub struct PostgresStorage {
    client: Mutex<Client>,
    tx_counter: AtomicU64,
    gate: TransactionGate,
}

impl PostgresStorage {
    pub fn new(connection_string: &str, options: &PostgresOptions) -> Result<Self, StorageError> {
        let mut config = Config::from_str(connection_string)
            .map_err(|e| StorageError::Other(format!("invalid PostgreSQL connection string: {}", e)))?;
        config.connect_timeout(options.connect_timeout);
        config.options(&format!(
            "-c statement_timeout={}",
            options.statement_timeout.as_millis()
        ));

        let client = config.connect(NoTls).map_err(|e| match map_error(e) {
            StorageError::Other(msg) => StorageError::Unavailable(format!("PostgreSQL connection failed: {}", msg)),
            other => other,
        })?;

        let storage = Self {
            client: Mutex::new(client),
            tx_counter: AtomicU64::new(1),
            gate: TransactionGate::new(),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let ddl: String = Table::ALL.iter().map(|t| sql::create_table(t.def())).collect();
        self.client().batch_execute(&ddl).map_err(map_error)?;
        tracing::debug!("PostgreSQL schema ensured");
        Ok(())
    }

    fn client(&self) -> MutexGuard<'_, Client> {
        self.client.lock().unwrap()
    }

    fn execute(&self, stmt: &Statement) -> Result<u64, StorageError> {
        let params = bind_params(stmt)?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        let _pass = self.gate.enter();
        self.client().execute(stmt.sql.as_str(), &refs).map_err(map_error)
    }

    fn fetch(&self, stmt: &Statement) -> Result<Vec<postgres::Row>, StorageError> {
        let params = bind_params(stmt)?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        let _pass = self.gate.enter();
        self.client().query(stmt.sql.as_str(), &refs).map_err(map_error)
    }
}

fn map_error(e: postgres::Error) -> StorageError {
    if let Some(code) = e.code() {
        if *code == SqlState::UNIQUE_VIOLATION {
            let detail = e
                .as_db_error()
                .map(|db| db.message().to_string())
                .unwrap_or_else(|| e.to_string());
            return StorageError::ConstraintViolation(detail);
        }
        if *code == SqlState::QUERY_CANCELED {
            return StorageError::Timeout(e.to_string());
        }
    }
    let timed_out = std::error::Error::source(&e)
        .and_then(|s| s.downcast_ref::<std::io::Error>())
        .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut);
    if timed_out || e.to_string().contains("timeout") {
        return StorageError::Timeout(e.to_string());
    }
    if e.is_closed() {
        return StorageError::Unavailable(e.to_string());
    }
    StorageError::Other(e.to_string())
}

fn text_of(value: &Value) -> Result<Option<String>, StorageError> {
    Ok(match value {
        Value::Null => None,
        Value::Timestamp(ts) => Some(
            ts.format(&Rfc3339)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        ),
        other => Some(other.to_string()),
    })
}

fn bind_params(stmt: &Statement) -> Result<Vec<Box<dyn ToSql + Sync>>, StorageError> {
    stmt.params
        .iter()
        .map(|(kind, value)| -> Result<Box<dyn ToSql + Sync>, StorageError> {
            Ok(match (kind, value) {
                (ColumnKind::Int, Value::Int(i)) => Box::new(Some(*i)),
                (ColumnKind::Int, Value::Null) => Box::new(None::<i64>),
                (ColumnKind::Bool, Value::Bool(b)) => Box::new(Some(*b)),
                (ColumnKind::Bool, Value::Null) => Box::new(None::<bool>),
                (ColumnKind::Int, other) | (ColumnKind::Bool, other) => {
                    return Err(StorageError::Serialization(format!(
                        "cannot bind {} as {:?}",
                        other, kind
                    )))
                }
                (_, value) => Box::new(text_of(value)?),
            })
        })
        .collect()
}

fn decode_value(row: &postgres::Row, idx: usize, column: &ColumnDef) -> Result<Value, StorageError> {
    let err = |e: postgres::Error| StorageError::Serialization(format!("{}: {}", column.name, e));
    Ok(match column.kind {
        ColumnKind::Int => row.try_get::<_, Option<i64>>(idx).map_err(err)?.into(),
        ColumnKind::Bool => row.try_get::<_, Option<bool>>(idx).map_err(err)?.into(),
        ColumnKind::Text => row.try_get::<_, Option<String>>(idx).map_err(err)?.into(),
        ColumnKind::Money => match row.try_get::<_, Option<String>>(idx).map_err(err)? {
            Some(s) => Value::Money(
                Decimal::from_str(&s).map_err(|e| StorageError::Serialization(format!("invalid decimal: {}", e)))?,
            ),
            None => Value::Null,
        },
        ColumnKind::Timestamp => match row.try_get::<_, Option<String>>(idx).map_err(err)? {
            Some(s) => Value::Timestamp(
                OffsetDateTime::parse(&s, &Rfc3339)
                    .map_err(|e| StorageError::Serialization(format!("invalid timestamp: {}", e)))?,
            ),
            None => Value::Null,
        },
    })
}

fn decode_record(row: &postgres::Row, offset: usize, def: &TableDef) -> Result<Record, StorageError> {
    let mut record = Record::new();
    for (i, column) in def.columns.iter().enumerate() {
        record.set(column.name, decode_value(row, offset + i, column)?);
    }
    Ok(record)
}

impl StorageBackend for PostgresStorage {
    fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        let stmt = sql::insert(table.def(), &record, Conflict::Fail)?;
        let rows = self.fetch(&stmt)?;
        let row = rows
            .first()
            .ok_or_else(|| StorageError::Other(format!("insert into {} returned no row", table)))?;
        tracing::debug!(table = %table, "PostgreSQL insert");
        decode_record(row, 0, table.def())
    }

    fn insert_if_absent(&self, table: Table, record: Record) -> Result<bool, StorageError> {
        let stmt = sql::insert(table.def(), &record, Conflict::Ignore)?;
        Ok(self.execute(&stmt)? > 0)
    }

    fn upsert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        let stmt = sql::insert(table.def(), &record, Conflict::Overwrite)?;
        let rows = self.fetch(&stmt)?;
        match rows.first() {
            Some(row) => decode_record(row, 0, table.def()),
            None => Ok(record),
        }
    }

    fn update(&self, table: Table, id: &str, patch: Record) -> Result<(), StorageError> {
        let stmt = sql::update(table.def(), id, &patch)?;
        let affected = if patch.is_empty() {
            self.fetch(&stmt)?.len() as u64
        } else {
            self.execute(&stmt)?
        };
        if affected == 0 {
            return Err(StorageError::not_found(table, id));
        }
        tracing::debug!(table = %table, id, "PostgreSQL update");
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<Rows, StorageError> {
        let stmt = sql::select(query)?;
        let pg_rows = self.fetch(&stmt)?;
        let def = query.table.def();

        let mut result = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let mut row = Row::new(decode_record(pg_row, 0, def)?);
            let mut offset = def.columns.len();
            for join in &query.joins {
                let join_def = join.table.def();
                let joined = decode_record(pg_row, offset, join_def)?;
                offset += join_def.columns.len();
                let present = !joined.get(join_def.primary_key).is_null();
                row.joined.insert(join.alias, present.then_some(joined));
            }
            result.push(row);
        }
        Ok(Box::new(result.into_iter()))
    }

    fn delete(&self, table: Table, id: &str) -> Result<(), StorageError> {
        let affected = self.execute(&sql::delete(table.def(), id))?;
        if affected == 0 {
            return Err(StorageError::not_found(table, id));
        }
        tracing::debug!(table = %table, id, "PostgreSQL delete");
        Ok(())
    }

    fn purge(&self, table: Table) -> Result<u64, StorageError> {
        let _pass = self.gate.enter();
        let removed = self
            .client()
            .execute(format!("DELETE FROM {}", table.name()).as_str(), &[])
            .map_err(map_error)?;
        tracing::debug!(table = %table, removed, "PostgreSQL purge");
        Ok(removed)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        self.gate
            .begin(tx_id, || self.client().batch_execute("BEGIN").map_err(map_error))?;
        tracing::debug!(tx_id, "PostgreSQL transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.gate
            .end(tx_id, |()| self.client().batch_execute("COMMIT").map_err(map_error))?;
        tracing::debug!(tx_id, "PostgreSQL transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.gate
            .end(tx_id, |()| self.client().batch_execute("ROLLBACK").map_err(map_error))?;
        tracing::debug!(tx_id, "PostgreSQL transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashreport_core::schema;

    fn connect() -> Option<PostgresStorage> {
        let url = std::env::var("FLASHREPORT_TEST_POSTGRES_URL").ok()?;
        Some(PostgresStorage::new(&url, &PostgresOptions::default()).unwrap())
    }

    #[test]
    fn test_bind_rejects_mismatched_kinds() {
        let stmt = Statement {
            sql: "SELECT $1".to_string(),
            params: vec![(ColumnKind::Int, Value::from("seven"))],
        };
        assert!(bind_params(&stmt).is_err());
    }

    #[test]
    #[ignore = "requires FLASHREPORT_TEST_POSTGRES_URL"]
    fn test_postgres_seed_and_soft_delete() {
        let Some(storage) = connect() else { return };
        for table in Table::ALL.iter().rev() {
            storage.purge(*table).unwrap();
        }
        schema::seed(&storage).unwrap();
        assert_eq!(schema::seed(&storage).unwrap(), 0, "seeding twice must not duplicate");

        storage.delete(Table::BusinessUnits, schema::DEFAULT_BUSINESS_UNIT_ID).unwrap();
        let rows: Vec<Row> = storage
            .query(&Query::new(Table::BusinessUnits).eq("id", schema::DEFAULT_BUSINESS_UNIT_ID))
            .unwrap()
            .collect();
        assert_eq!(rows[0].record.bool("is_active"), Some(false));
    }

    #[test]
    #[ignore = "requires FLASHREPORT_TEST_POSTGRES_URL"]
    fn test_postgres_transactions_do_not_nest_or_leak() {
        let Some(storage) = connect() else { return };
        let storage = std::sync::Arc::new(storage);
        storage.purge(Table::AppConfig).unwrap();

        let tx = storage.begin_transaction().unwrap();
        assert!(matches!(storage.begin_transaction(), Err(StorageError::TransactionInProgress)));

        let writer = {
            let storage = storage.clone();
            std::thread::spawn(move || {
                storage.upsert(Table::AppConfig, Record::new().with("key", "theme").with("value", "dark"))
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!writer.is_finished());

        storage.rollback_transaction(tx).unwrap();
        writer.join().unwrap().unwrap();
        let kept = storage.query(&Query::new(Table::AppConfig).eq("key", "theme")).unwrap().count();
        assert_eq!(kept, 1);
    }
}
