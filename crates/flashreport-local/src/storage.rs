use std::{
    cmp::Ordering as CmpOrdering,
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use flashreport_core::{
    schema::{default_rows, ACTIVE_COLUMN},
    Query, Record, Row, Rows, StorageBackend, StorageError, Table, TableDef, TransactionGate, TransactionId,
    Value,
};

use crate::{
    blob::{BlobStore, MemoryBlobStore},
    codec::{self, Tables},
};

/// Key under which the whole table set is persisted.
pub const BLOB_KEY: &str = "flashreport_db";

/// Local variant: every table lives in memory and the full set is
/// re-serialized to the blob store after each mutating call. All writes go
/// through one write lock, and the flush happens while it is held.
///
/// A transaction keeps a snapshot of every table for rollback. Calls from
/// other threads wait at the gate until it ends, so restoring the snapshot
/// never discards their writes.
pub struct LocalStorage {
    tables: RwLock<Tables>,
    blob: Arc<dyn BlobStore>,
    tx_counter: AtomicU64,
    gate: TransactionGate<Tables>,
}

impl LocalStorage {
    /// Loads the persisted blob, merging in factory defaults for any required
    /// table that is missing or empty. A blob that cannot be decoded is
    /// replaced by defaults.
    pub fn open(blob: Arc<dyn BlobStore>) -> Result<Self, StorageError> {
        let mut tables = match blob.load(BLOB_KEY)? {
            Some(raw) => codec::decode(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Local blob is unreadable, starting from defaults");
                Tables::new()
            }),
            None => Tables::new(),
        };

        for table in Table::ALL {
            tables.entry(table).or_default();
        }
        let injected = inject_defaults(&mut tables);
        if injected > 0 {
            tracing::info!(rows = injected, "Injected default rows into local store");
        }
        blob.save(BLOB_KEY, &codec::encode(&tables)?)?;

        Ok(Self {
            tables: RwLock::new(tables),
            blob,
            tx_counter: AtomicU64::new(1),
            gate: TransactionGate::new(),
        })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::open(Arc::new(MemoryBlobStore::new()))
    }

    fn flush(&self, tables: &Tables) -> Result<(), StorageError> {
        let raw = codec::encode(tables)?;
        self.blob.save(BLOB_KEY, &raw)?;
        tracing::debug!(bytes = raw.len(), "Local store flushed");
        Ok(())
    }

    /// Applies `f` to one table under the write lock, then flushes. A failed
    /// flush restores the table to its previous contents.
    fn mutate<T>(
        &self,
        table: Table,
        f: impl FnOnce(&TableDef, &mut Vec<Record>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let _pass = self.gate.enter();
        let mut tables = self.tables.write().unwrap();
        let rows = tables.entry(table).or_default();
        let backup = rows.clone();
        let result = f(table.def(), rows)?;
        if let Err(e) = self.flush(&tables) {
            tables.insert(table, backup);
            return Err(e);
        }
        Ok(result)
    }
}

fn inject_defaults(tables: &mut Tables) -> usize {
    let mut injected = 0;
    for table in Table::REQUIRED {
        let rows = tables.entry(table).or_default();
        if !rows.is_empty() {
            continue;
        }
        let defaults = default_rows(table);
        injected += defaults.len();
        rows.extend(defaults);

        if table == Table::Partners {
            let accounts = tables.entry(Table::PartnerAccounts).or_default();
            for account in default_rows(Table::PartnerAccounts) {
                let taken = accounts.iter().any(|a| {
                    a.get("id") == account.get("id") || a.get("partner_id") == account.get("partner_id")
                });
                if !taken {
                    accounts.push(account);
                    injected += 1;
                }
            }
        }
    }
    injected
}

fn primary_key<'a>(def: &TableDef, record: &'a Record) -> Result<&'a str, StorageError> {
    match record.text(def.primary_key) {
        Some(pk) if !pk.is_empty() => Ok(pk),
        _ => Err(StorageError::Serialization(format!(
            "{} record is missing {}",
            def.name, def.primary_key
        ))),
    }
}

fn check_columns(def: &TableDef, record: &Record) -> Result<(), StorageError> {
    for (column, _) in record.iter() {
        if def.column(column).is_none() {
            return Err(StorageError::Serialization(format!(
                "unknown column {}.{}",
                def.name, column
            )));
        }
    }
    Ok(())
}

fn position(def: &TableDef, rows: &[Record], id: &str) -> Option<usize> {
    rows.iter().position(|r| r.text(def.primary_key) == Some(id))
}

fn check_unique(def: &TableDef, rows: &[Record], candidate: &Record, skip: Option<usize>) -> Result<(), StorageError> {
    for key in def.unique_keys {
        if key.iter().any(|c| candidate.get(c).is_null()) {
            continue;
        }
        let clash = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .any(|(_, row)| key.iter().all(|c| row.get(c) == candidate.get(c)));
        if clash {
            let values: Vec<String> = key.iter().map(|c| candidate.get(c).to_string()).collect();
            return Err(StorageError::ConstraintViolation(format!(
                "duplicate {}({}) = ({})",
                def.name,
                key.join(", "),
                values.join(", ")
            )));
        }
    }
    Ok(())
}

fn insert_row(def: &TableDef, rows: &mut Vec<Record>, record: Record) -> Result<Record, StorageError> {
    check_columns(def, &record)?;
    let pk = primary_key(def, &record)?;
    if position(def, rows, pk).is_some() {
        return Err(StorageError::ConstraintViolation(format!(
            "duplicate {}.{} = {}",
            def.name, def.primary_key, pk
        )));
    }
    check_unique(def, rows, &record, None)?;
    rows.push(record.clone());
    Ok(record)
}

fn update_row(def: &TableDef, rows: &mut [Record], table: Table, id: &str, patch: &Record) -> Result<(), StorageError> {
    check_columns(def, patch)?;
    let idx = position(def, rows, id).ok_or_else(|| StorageError::not_found(table, id))?;
    if let Some(new_pk) = patch.text(def.primary_key) {
        if new_pk != id {
            return Err(StorageError::ConstraintViolation(format!(
                "{}.{} cannot be changed",
                def.name, def.primary_key
            )));
        }
    }
    let mut updated = rows[idx].clone();
    updated.merge(patch);
    check_unique(def, rows, &updated, Some(idx))?;
    rows[idx] = updated;
    Ok(())
}

fn compare_rows(query: &Query, a: &Record, b: &Record) -> CmpOrdering {
    for order in &query.order_by {
        let ord = a.get(order.column).sort_cmp(b.get(order.column));
        let ord = if order.descending { ord.reverse() } else { ord };
        if ord != CmpOrdering::Equal {
            return ord;
        }
    }
    CmpOrdering::Equal
}

impl StorageBackend for LocalStorage {
    fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        let inserted = self.mutate(table, |def, rows| insert_row(def, rows, record))?;
        tracing::debug!(table = %table, "Local insert");
        Ok(inserted)
    }

    fn insert_if_absent(&self, table: Table, record: Record) -> Result<bool, StorageError> {
        {
            let _pass = self.gate.enter();
            let tables = self.tables.read().unwrap();
            let def = table.def();
            let pk = primary_key(def, &record)?;
            if tables.get(&table).is_some_and(|rows| position(def, rows, pk).is_some()) {
                return Ok(false);
            }
        }
        self.mutate(table, |def, rows| {
            let pk = primary_key(def, &record)?;
            if position(def, rows, pk).is_some() {
                return Ok(false);
            }
            insert_row(def, rows, record).map(|_| true)
        })
    }

    fn upsert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        self.mutate(table, |def, rows| {
            let pk = primary_key(def, &record)?.to_string();
            match position(def, rows, &pk) {
                Some(idx) => {
                    update_row(def, rows, table, &pk, &record)?;
                    Ok(rows[idx].clone())
                }
                None => insert_row(def, rows, record),
            }
        })
    }

    fn update(&self, table: Table, id: &str, patch: Record) -> Result<(), StorageError> {
        self.mutate(table, |def, rows| update_row(def, rows, table, id, &patch))?;
        tracing::debug!(table = %table, id, "Local update");
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<Rows, StorageError> {
        let _pass = self.gate.enter();
        let tables = self.tables.read().unwrap();
        let empty = Vec::new();
        let rows = tables.get(&query.table).unwrap_or(&empty);

        let mut matched: Vec<&Record> = rows.iter().filter(|r| query.matches(r)).collect();
        matched.sort_by(|a, b| compare_rows(query, a, b));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        let lookups: Vec<HashMap<&str, &Record>> = query
            .joins
            .iter()
            .map(|join| {
                let def = join.table.def();
                tables
                    .get(&join.table)
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|r| r.text(def.primary_key).map(|pk| (pk, r)))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        let result: Vec<Row> = matched
            .into_iter()
            .map(|record| {
                let mut row = Row::new(record.clone());
                for (join, lookup) in query.joins.iter().zip(&lookups) {
                    let joined = record
                        .text(join.foreign_key)
                        .and_then(|fk| lookup.get(fk))
                        .map(|r| (*r).clone());
                    row.joined.insert(join.alias, joined);
                }
                row
            })
            .collect();

        Ok(Box::new(result.into_iter()))
    }

    fn delete(&self, table: Table, id: &str) -> Result<(), StorageError> {
        self.mutate(table, |def, rows| {
            let idx = position(def, rows, id).ok_or_else(|| StorageError::not_found(table, id))?;
            if def.soft_delete {
                rows[idx].set(ACTIVE_COLUMN, Value::Bool(false));
            } else {
                rows.remove(idx);
            }
            Ok(())
        })?;
        tracing::debug!(table = %table, id, "Local delete");
        Ok(())
    }

    fn purge(&self, table: Table) -> Result<u64, StorageError> {
        let removed = self.mutate(table, |_, rows| {
            let count = rows.len() as u64;
            rows.clear();
            Ok(count)
        })?;
        tracing::debug!(table = %table, removed, "Local purge");
        Ok(removed)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        self.gate.begin(tx_id, || Ok(self.tables.read().unwrap().clone()))?;
        tracing::debug!(tx_id, "Transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.gate.end(tx_id, |_| Ok(()))?;
        tracing::debug!(tx_id, "Transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.gate.end(tx_id, |snapshot| {
            let mut tables = self.tables.write().unwrap();
            *tables = snapshot;
            self.flush(&tables)
        })?;
        tracing::debug!(tx_id, "Transaction rolled back");
        Ok(())
    }
}
